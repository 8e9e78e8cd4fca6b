pub mod repository;

pub use repository::{
    create_post, delete_post, distinct_tags, get_post, get_post_by_slug, list_posts, update_post,
};
