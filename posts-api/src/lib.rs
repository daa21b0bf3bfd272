/*!
Types and tools to talk to a JSON posts/comments REST service.

The service exposes three endpoints that this crate consumes:

- `GET /posts`: every post, in server order
- `GET /posts/{id}/comments`: the comments attached to one post
- `DELETE /posts/{id}`: remove a post; only the status code is inspected

[`PostsService`] is the seam the rest of the workspace programs against, and
[`HttpPostsClient`] is the reqwest-backed implementation of it.
*/

pub mod client;
pub mod error;
pub mod models;

pub use client::{HttpPostsClient, PostsService, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use models::{Comment, Post, PostId};
