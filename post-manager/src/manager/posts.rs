/*!
In-memory collection of posts currently shown to the user
*/

use posts_api::{Post, PostId};

#[derive(Debug, Clone, Default)]
pub struct PostCollection {
    posts: Vec<Post>,
}

impl PostCollection {
    pub fn new(posts: Vec<Post>) -> Self {
        Self { posts }
    }

    /// Replace the whole collection, keeping server order
    pub fn replace_all(&mut self, posts: Vec<Post>) {
        self.posts = posts;
    }

    /// Remove every post with this id; returns how many were dropped
    pub fn remove(&mut self, post_id: PostId) -> usize {
        let before = self.posts.len();
        self.posts.retain(|post| post.id != post_id);
        before - self.posts.len()
    }

    /// Remove every post whose id is in `ids`
    pub fn hide(&mut self, ids: &[PostId]) {
        self.posts.retain(|post| !ids.contains(&post.id));
    }

    pub fn get(&self, post_id: PostId) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == post_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::testing::post;

    #[test]
    fn remove_drops_matching_posts_only() {
        let mut posts = PostCollection::new(vec![post(1), post(2), post(3)]);

        assert_eq!(posts.remove(2), 1);
        assert_eq!(posts.remove(42), 0);
        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn hide_filters_queued_ids() {
        let mut posts = PostCollection::new(vec![post(1), post(2), post(3), post(4)]);

        posts.hide(&[4, 2, 9]);

        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 3]);
        assert!(posts.get(2).is_none());
        assert!(posts.get(3).is_some());
    }
}
