/*!
Test doubles shared by the manager module tests
*/

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use posts_api::{ApiError, Comment, Post, PostId, PostsService};

pub fn post(id: PostId) -> Post {
    Post {
        id,
        title: format!("post {}", id),
        body: format!("body of post {}", id),
        user_id: Some(1),
    }
}

pub fn posts(ids: &[PostId]) -> Vec<Post> {
    ids.iter().copied().map(post).collect()
}

#[derive(Default)]
struct FakeState {
    posts: Vec<Post>,
    failing_deletes: HashSet<PostId>,
    fail_fetch: bool,
    delete_calls: Vec<PostId>,
    fetch_calls: usize,
}

/// In-memory posts service. Clones share state, so a test can keep a handle
/// while the session owns a boxed copy.
#[derive(Clone, Default)]
pub struct FakePostsService {
    state: Arc<Mutex<FakeState>>,
}

impl FakePostsService {
    pub fn with_posts(ids: &[PostId]) -> Self {
        let service = Self::default();
        service.state.lock().unwrap().posts = posts(ids);
        service
    }

    pub fn fail_delete(&self, post_id: PostId) {
        self.state.lock().unwrap().failing_deletes.insert(post_id);
    }

    pub fn heal_delete(&self, post_id: PostId) {
        self.state.lock().unwrap().failing_deletes.remove(&post_id);
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch = fail;
    }

    pub fn delete_calls(&self) -> Vec<PostId> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn remote_ids(&self) -> Vec<PostId> {
        self.state.lock().unwrap().posts.iter().map(|p| p.id).collect()
    }
}

fn server_error(path: String) -> ApiError {
    ApiError::Status {
        status: 500,
        url: format!("http://fake{}", path),
    }
}

#[async_trait]
impl PostsService for FakePostsService {
    async fn fetch_posts(&self) -> Result<Vec<Post>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        if state.fail_fetch {
            return Err(server_error("/posts".to_string()));
        }
        Ok(state.posts.clone())
    }

    async fn fetch_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        let state = self.state.lock().unwrap();
        if state.fail_fetch {
            return Err(server_error(format!("/posts/{}/comments", post_id)));
        }
        Ok((1..=2)
            .map(|n| Comment {
                id: post_id * 10 + n,
                name: format!("comment {} on {}", n, post_id),
                body: "nice post".to_string(),
                post_id: Some(post_id),
                email: None,
            })
            .collect())
    }

    async fn delete_post(&self, post_id: PostId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(post_id);
        if state.failing_deletes.contains(&post_id) {
            return Err(server_error(format!("/posts/{}", post_id)));
        }
        state.posts.retain(|p| p.id != post_id);
        Ok(())
    }
}
