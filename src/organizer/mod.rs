//! Navigation views derived from a flat post collection.
//!
//! Everything here is a pure function of its input: the tag index, the series
//! grouping, the year/month archive and the primary feed. A post may show up
//! in any number of views at once.

pub mod cache;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Month};
use serde::Serialize;

use crate::db::models::{normalize_tag, Post};

/// Label of the tag-index entry that stands for "no filter".
pub const ALL_TAGS: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagIndex {
    /// Count of the "All" entry: every post in the collection.
    pub all: usize,
    /// Distinct tags, ascending.
    pub tags: Vec<TagCount>,
}

impl TagIndex {
    /// The "All" entry followed by each tag.
    pub fn entries(&self) -> impl Iterator<Item = (&str, usize)> {
        std::iter::once((ALL_TAGS, self.all))
            .chain(self.tags.iter().map(|t| (t.tag.as_str(), t.count)))
    }

    pub fn count(&self, tag: &str) -> usize {
        self.tags
            .iter()
            .find(|t| t.tag == tag)
            .map(|t| t.count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesGroup {
    pub name: String,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBucket {
    pub month: u32,
    pub name: &'static str,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearBucket {
    pub year: i32,
    pub months: Vec<MonthBucket>,
}

impl YearBucket {
    pub fn post_count(&self) -> usize {
        self.months.iter().map(|m| m.posts.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrimaryFeed {
    /// Rendered with full content.
    pub featured: Vec<Post>,
    /// Rendered as summaries.
    pub additional: Vec<Post>,
}

/// A post's position within its series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesNavigation {
    pub series: String,
    /// 1-based.
    pub position: usize,
    pub total: usize,
    pub prev: Option<Post>,
    pub next: Option<Post>,
}

pub fn tag_index(posts: &[Post]) -> TagIndex {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for post in posts {
        // A post counts once per tag even if its tag list repeats one.
        let unique: BTreeSet<&str> = post.tags.iter().map(String::as_str).collect();
        for tag in unique {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }

    TagIndex {
        all: posts.len(),
        tags: counts
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag: tag.to_string(),
                count,
            })
            .collect(),
    }
}

/// Posts carrying `tag`, in their original order. No tag (or a blank one)
/// selects everything. The tag is normalized the same way stored tags are.
pub fn filter_by_tag(posts: &[Post], tag: Option<&str>) -> Vec<Post> {
    match tag.and_then(normalize_tag) {
        Some(tag) => posts.iter().filter(|p| p.has_tag(&tag)).cloned().collect(),
        None => posts.to_vec(),
    }
}

/// Ascending `series_order` (missing sorts as 0), then ascending `id`.
fn series_cmp(a: &Post, b: &Post) -> Ordering {
    let order = |p: &Post| p.series_order.unwrap_or(0.0);
    order(a).total_cmp(&order(b)).then(a.id.cmp(&b.id))
}

/// Newest first; equal timestamps fall back to the higher id.
fn recency_cmp(a: &Post, b: &Post) -> Ordering {
    b.created_or_epoch()
        .cmp(&a.created_or_epoch())
        .then(b.id.cmp(&a.id))
}

pub fn series_groups(posts: &[Post]) -> Vec<SeriesGroup> {
    let mut groups: BTreeMap<&str, Vec<Post>> = BTreeMap::new();
    for post in posts {
        if let Some(series) = post.series_name() {
            groups.entry(series).or_default().push(post.clone());
        }
    }

    groups
        .into_iter()
        .map(|(name, mut posts)| {
            posts.sort_by(series_cmp);
            SeriesGroup {
                name: name.to_string(),
                posts,
            }
        })
        .collect()
}

pub fn series_navigation(posts: &[Post], current: &Post) -> Option<SeriesNavigation> {
    let series = current.series_name()?;
    let mut members: Vec<&Post> = posts
        .iter()
        .filter(|p| p.series_name() == Some(series))
        .collect();
    members.sort_by(|a, b| series_cmp(a, b));

    let index = members.iter().position(|p| p.id == current.id)?;
    Some(SeriesNavigation {
        series: series.to_string(),
        position: index + 1,
        total: members.len(),
        prev: index.checked_sub(1).map(|i| members[i].clone()),
        next: members.get(index + 1).map(|p| (*p).clone()),
    })
}

pub fn date_tree(posts: &[Post]) -> Vec<YearBucket> {
    let mut years: BTreeMap<i32, BTreeMap<u32, Vec<Post>>> = BTreeMap::new();
    for post in posts {
        let created = post.created_or_epoch();
        years
            .entry(created.year())
            .or_default()
            .entry(created.month())
            .or_default()
            .push(post.clone());
    }

    years
        .into_iter()
        .rev()
        .map(|(year, months)| YearBucket {
            year,
            months: months
                .into_iter()
                .rev()
                .map(|(month, mut posts)| {
                    posts.sort_by(recency_cmp);
                    MonthBucket {
                        month,
                        name: month_name(month),
                        posts,
                    }
                })
                .collect(),
        })
        .collect()
}

pub fn primary_feed(posts: &[Post], featured_count: usize) -> PrimaryFeed {
    let mut sorted = posts.to_vec();
    sorted.sort_by(recency_cmp);
    let additional = sorted.split_off(featured_count.min(sorted.len()));
    PrimaryFeed {
        featured: sorted,
        additional,
    }
}

fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown")
}

/// All organizer views of one post collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    #[serde(skip)]
    pub posts: Vec<Post>,
    pub tags: TagIndex,
    pub series: Vec<SeriesGroup>,
    pub archive: Vec<YearBucket>,
}

impl Projection {
    pub fn build(posts: Vec<Post>) -> Self {
        Self {
            tags: tag_index(&posts),
            series: series_groups(&posts),
            archive: date_tree(&posts),
            posts,
        }
    }

    pub fn feed(&self, tag: Option<&str>, featured_count: usize) -> PrimaryFeed {
        primary_feed(&filter_by_tag(&self.posts, tag), featured_count)
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.slug == slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(y: i32, m: u32, d: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap())
    }

    fn post(id: i64) -> Post {
        Post {
            id,
            title: format!("Post {}", id),
            slug: format!("post-{}", id),
            content: String::new(),
            excerpt: None,
            category: None,
            tags: Vec::new(),
            series: None,
            series_order: None,
            published: true,
            created_at: at(2024, 1, 1),
            updated_at: None,
        }
    }

    fn tagged(id: i64, tags: &[&str]) -> Post {
        Post {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..post(id)
        }
    }

    fn in_series(id: i64, series: &str, order: Option<f64>) -> Post {
        Post {
            series: Some(series.to_string()),
            series_order: order,
            ..post(id)
        }
    }

    fn ids(posts: &[Post]) -> Vec<i64> {
        posts.iter().map(|p| p.id).collect()
    }

    #[test]
    fn empty_input_yields_empty_views() {
        let projection = Projection::build(Vec::new());
        assert_eq!(projection.tags.all, 0);
        assert!(projection.tags.tags.is_empty());
        assert!(projection.series.is_empty());
        assert!(projection.archive.is_empty());

        let feed = projection.feed(None, 3);
        assert!(feed.featured.is_empty());
        assert!(feed.additional.is_empty());
    }

    #[test]
    fn tag_index_counts_posts_per_tag_and_all() {
        let posts = vec![
            tagged(1, &["rust", "web"]),
            tagged(2, &["rust"]),
            tagged(3, &[]),
            tagged(4, &["async", "rust", "rust"]),
        ];
        let index = tag_index(&posts);

        assert_eq!(index.all, 4);
        let entries: Vec<(&str, usize)> = index.entries().collect();
        assert_eq!(
            entries,
            vec![("All", 4), ("async", 1), ("rust", 3), ("web", 1)]
        );
        for t in &index.tags {
            let expected = posts.iter().filter(|p| p.has_tag(&t.tag)).count();
            assert_eq!(t.count, expected);
        }
        assert_eq!(index.count("missing"), 0);
    }

    #[test]
    fn filter_by_tag_preserves_order() {
        let posts = vec![
            tagged(5, &["rust"]),
            tagged(2, &["go"]),
            tagged(9, &["rust"]),
        ];
        assert_eq!(ids(&filter_by_tag(&posts, Some("rust"))), vec![5, 9]);
        assert_eq!(ids(&filter_by_tag(&posts, Some("  Rust "))), vec![5, 9]);
        assert_eq!(ids(&filter_by_tag(&posts, None)), vec![5, 2, 9]);
        assert_eq!(ids(&filter_by_tag(&posts, Some(""))), vec![5, 2, 9]);
        assert!(filter_by_tag(&posts, Some("zig")).is_empty());
    }

    #[test]
    fn series_groups_sort_by_order_then_id() {
        let posts = vec![
            in_series(1, "X", Some(2.0)),
            in_series(2, "X", Some(1.0)),
            in_series(3, "A", None),
            in_series(4, "X", None),
            in_series(5, "A", Some(0.0)),
            post(6),
            in_series(7, "X", Some(1.0)),
        ];
        let groups = series_groups(&posts);

        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["A", "X"]);
        assert_eq!(ids(&groups[0].posts), vec![3, 5]);
        assert_eq!(ids(&groups[1].posts), vec![4, 2, 7, 1]);
    }

    #[test]
    fn series_order_property_holds() {
        let posts: Vec<Post> = (1..=12)
            .map(|i| in_series(i, "S", if i % 3 == 0 { None } else { Some((i % 5) as f64) }))
            .collect();
        let group = &series_groups(&posts)[0];
        for pair in group.posts.windows(2) {
            let key = |p: &Post| (p.series_order.unwrap_or(0.0), p.id);
            let (a, b) = (key(&pair[0]), key(&pair[1]));
            assert!(a.0 < b.0 || (a.0 == b.0 && a.1 < b.1));
        }
    }

    #[test]
    fn scenario_series_and_date_tree() {
        let posts = vec![
            Post {
                created_at: at(2024, 1, 1),
                ..in_series(1, "X", Some(2.0))
            },
            Post {
                created_at: at(2024, 2, 1),
                ..in_series(2, "X", Some(1.0))
            },
        ];

        let groups = series_groups(&posts);
        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups[0].posts), vec![2, 1]);

        let tree = date_tree(&posts);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].year, 2024);
        let months: Vec<(u32, &str, Vec<i64>)> = tree[0]
            .months
            .iter()
            .map(|m| (m.month, m.name, ids(&m.posts)))
            .collect();
        assert_eq!(
            months,
            vec![(2, "February", vec![2]), (1, "January", vec![1])]
        );
    }

    #[test]
    fn date_tree_sorts_years_months_and_posts_descending() {
        let posts = vec![
            Post { created_at: at(2022, 12, 5), ..post(1) },
            Post { created_at: at(2024, 3, 1), ..post(2) },
            Post { created_at: at(2024, 3, 20), ..post(3) },
            Post { created_at: at(2023, 7, 7), ..post(4) },
            Post { created_at: at(2024, 11, 2), ..post(5) },
        ];
        let tree = date_tree(&posts);

        let years: Vec<i32> = tree.iter().map(|y| y.year).collect();
        assert_eq!(years, vec![2024, 2023, 2022]);
        let months_2024: Vec<u32> = tree[0].months.iter().map(|m| m.month).collect();
        assert_eq!(months_2024, vec![11, 3]);
        assert_eq!(ids(&tree[0].months[1].posts), vec![3, 2]);
        assert_eq!(tree[0].post_count(), 3);
    }

    #[test]
    fn date_tree_is_lossless() {
        let posts: Vec<Post> = (1..=30)
            .map(|i| Post {
                created_at: if i % 7 == 0 {
                    None
                } else {
                    at(2020 + (i % 4) as i32, (i % 12) as u32 + 1, 1)
                },
                ..post(i)
            })
            .collect();

        let mut flattened: Vec<i64> = date_tree(&posts)
            .iter()
            .flat_map(|y| y.months.iter())
            .flat_map(|m| m.posts.iter().map(|p| p.id))
            .collect();
        flattened.sort();
        assert_eq!(flattened, (1..=30).collect::<Vec<_>>());
    }

    #[test]
    fn missing_timestamp_lands_in_epoch_bucket() {
        let posts = vec![Post {
            created_at: None,
            ..post(1)
        }];
        let tree = date_tree(&posts);
        assert_eq!(tree[0].year, 1970);
        assert_eq!(tree[0].months[0].month, 1);
    }

    #[test]
    fn primary_feed_features_the_three_newest() {
        let posts: Vec<Post> = (1..=5)
            .map(|i| Post {
                created_at: at(2024, i as u32, 1),
                ..post(i)
            })
            .collect();
        let feed = primary_feed(&posts, 3);
        assert_eq!(ids(&feed.featured), vec![5, 4, 3]);
        assert_eq!(ids(&feed.additional), vec![2, 1]);

        let short = primary_feed(&posts[..2], 3);
        assert_eq!(ids(&short.featured), vec![2, 1]);
        assert!(short.additional.is_empty());
    }

    #[test]
    fn feed_applies_tag_filter_before_featuring() {
        let posts = vec![
            Post { created_at: at(2024, 1, 1), ..tagged(1, &["rust"]) },
            Post { created_at: at(2024, 2, 1), ..tagged(2, &["go"]) },
            Post { created_at: at(2024, 3, 1), ..tagged(3, &["rust"]) },
        ];
        let projection = Projection::build(posts);
        let feed = projection.feed(Some("rust"), 1);
        assert_eq!(ids(&feed.featured), vec![3]);
        assert_eq!(ids(&feed.additional), vec![1]);
        assert_eq!(projection.tags.all, 3);
    }

    #[test]
    fn series_navigation_finds_neighbours() {
        let posts = vec![
            in_series(1, "X", Some(3.0)),
            in_series(2, "X", Some(1.0)),
            in_series(3, "X", Some(2.0)),
            post(4),
        ];
        let nav = series_navigation(&posts, &posts[2]).unwrap();
        assert_eq!(nav.series, "X");
        assert_eq!((nav.position, nav.total), (2, 3));
        assert_eq!(nav.prev.map(|p| p.id), Some(2));
        assert_eq!(nav.next.map(|p| p.id), Some(1));

        let first = series_navigation(&posts, &posts[1]).unwrap();
        assert!(first.prev.is_none());
        assert!(series_navigation(&posts, &posts[3]).is_none());
    }
}
