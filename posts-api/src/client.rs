/*!
HTTP access to the posts service
*/

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use tracing::debug;

use crate::{
    error::ApiError,
    models::{Comment, Post, PostId},
};

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// Remote collection of posts
#[async_trait]
pub trait PostsService: Send + Sync {
    /// Fetch every post, in server order
    async fn fetch_posts(&self) -> Result<Vec<Post>, ApiError>;

    /// Fetch the comments attached to a post
    async fn fetch_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError>;

    /// Delete a post. Any 2xx status counts as success; the body is ignored.
    async fn delete_post(&self, post_id: PostId) -> Result<(), ApiError>;
}

/// reqwest-backed [`PostsService`]
#[derive(Debug, Clone)]
pub struct HttpPostsClient {
    base_url: String,
    client: Client,
}

impl HttpPostsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn posts_url(&self) -> String {
        format!("{}/posts", self.base_url)
    }

    fn post_url(&self, post_id: PostId) -> String {
        format!("{}/posts/{}", self.base_url, post_id)
    }

    fn comments_url(&self, post_id: PostId) -> String {
        format!("{}/posts/{}/comments", self.base_url, post_id)
    }
}

fn check_status(response: Response, url: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response)
}

#[async_trait]
impl PostsService for HttpPostsClient {
    async fn fetch_posts(&self) -> Result<Vec<Post>, ApiError> {
        let url = self.posts_url();
        debug!("GET {}", url);

        let response = check_status(self.client.get(&url).send().await?, &url)?;
        let posts: Vec<Post> = response.json().await?;

        debug!("Fetched {} posts", posts.len());
        Ok(posts)
    }

    async fn fetch_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        let url = self.comments_url(post_id);
        debug!("GET {}", url);

        let response = check_status(self.client.get(&url).send().await?, &url)?;
        Ok(response.json().await?)
    }

    async fn delete_post(&self, post_id: PostId) -> Result<(), ApiError> {
        let url = self.post_url(post_id);
        debug!("DELETE {}", url);

        check_status(self.client.delete(&url).send().await?, &url)?;
        Ok(())
    }
}
