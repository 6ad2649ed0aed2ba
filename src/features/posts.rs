//! Posts from the demo API.
//!
//! The demo backend accepts writes without persisting them, so a created
//! post keeps its provisional id and the list is never refetched to confirm
//! it. Provisional ids are negative and are never fetched as details.

use std::time::Duration;

use crate::api::posts::{self, NewPost, Post};
use crate::api::ApiClient;
use crate::cache::QueryFilter;
use crate::infinite::{InfiniteData, InfiniteQuery, PageCursor};
use crate::mutation::{Mutation, OptimisticPolicy};
use crate::query::{Query, QueryClient, QueryOptions, RetryPolicy};
use crate::validate;

use super::keys;

pub const PAGE_SIZE: u32 = 10;
const LIST_STALE_TIME: Duration = Duration::from_secs(3 * 60);
const DETAIL_STALE_TIME: Duration = Duration::from_secs(5 * 60);

pub fn list_options(client: &QueryClient) -> QueryOptions {
  client
    .query_options()
    .stale_time(LIST_STALE_TIME)
    .retry(RetryPolicy::standard(1))
}

pub fn list_query(client: &QueryClient, api: &ApiClient) -> InfiniteQuery<Post> {
  let api = api.clone();
  InfiniteQuery::new(
    client.clone(),
    keys::post_lists(),
    list_options(client),
    PageCursor::Number(1),
    move |cursor| {
      let api = api.clone();
      async move { posts::list(&api, cursor.number().unwrap_or(1), PAGE_SIZE).await }
    },
  )
}

/// Detail reads are only enabled for ids the server issued.
pub fn detail_options(client: &QueryClient, id: i64, enabled: bool) -> QueryOptions {
  client
    .query_options()
    .enabled(enabled && id > 0)
    .stale_time(DETAIL_STALE_TIME)
    .retry(RetryPolicy::standard(1))
}

pub fn detail_query(client: &QueryClient, api: &ApiClient, id: i64, enabled: bool) -> Query<Post> {
  let api = api.clone();
  Query::new(
    client.clone(),
    keys::post_detail(id),
    detail_options(client, id, enabled),
    move || {
      let api = api.clone();
      async move { posts::get(&api, id).await }
    },
  )
}

/// Negative millisecond timestamp; never collides with a server id.
pub fn provisional_id() -> i64 {
  -chrono::Utc::now().timestamp_millis()
}

pub fn validate_new_post(input: &NewPost) -> validate::Validation {
  validate::required("title", &input.title)?;
  validate::required("body", &input.body)
}

pub fn create_post(api: &ApiClient) -> Mutation<NewPost, Post> {
  create_post_with(api, provisional_id)
}

pub(crate) fn create_post_with(api: &ApiClient, next_id: fn() -> i64) -> Mutation<NewPost, Post> {
  let api = api.clone();
  Mutation::new("create post", move |input: NewPost| {
    let api = api.clone();
    async move { posts::create(&api, &input).await }
  })
  .validate(validate_new_post)
  .optimistic(
    |_| vec![QueryFilter::Exact(keys::post_lists())],
    move |input, txn| {
      let provisional = Post {
        id: next_id(),
        user_id: input.user_id,
        title: input.title.clone(),
        body: input.body.clone(),
      };
      txn.update_matching::<InfiniteData<Post>, _>(&QueryFilter::Exact(keys::post_lists()), |data| {
        data.with_prepended(provisional.clone())
      });
    },
  )
  .policy(OptimisticPolicy::KeepOptimistic)
  .success_message("Success", "Post created. The demo API does not store it, so it only shows here.")
  .failure_title("Could not create post")
}

pub fn delete_post(api: &ApiClient) -> Mutation<i64, ()> {
  let api = api.clone();
  Mutation::new("delete post", move |id: i64| {
    let api = api.clone();
    async move { posts::delete(&api, id).await }
  })
  .on_success(|_, id, txn| {
    let id = *id;
    txn.remove(&keys::post_detail(id));
    txn.update_matching::<InfiniteData<Post>, _>(&QueryFilter::Prefix(keys::post_lists()), |data| {
      data.without(|post| post.id == id)
    });
  })
  .success_message("Success", "Post deleted")
  .failure_title("Could not delete post")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheEventKind;
  use crate::infinite::Page;
  use crate::notify::{Level, RecordingNotifier};
  use crate::error::SyncError;
  use serde_json::json;
  use std::sync::Arc;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn post(id: i64) -> Post {
    Post {
      id,
      user_id: 1,
      title: format!("post {id}"),
      body: "...".into(),
    }
  }

  fn seeded(client: &QueryClient, pages: Vec<Page<Post>>) {
    client.set_query_data(&keys::post_lists(), InfiniteData { pages });
  }

  #[tokio::test]
  async fn test_failed_create_restores_list_exactly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/posts"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "isSuccess": false,
        "errorMessages": ["Title is required"]
      })))
      .expect(1)
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let client = QueryClient::default().with_notifier(notifier.clone());
    seeded(&client, vec![Page::from_total(vec![post(1), post(2)], 1, 10, 2)]);

    let before = client.store().get_data::<InfiniteData<Post>>(&keys::post_lists()).unwrap();
    let mut events = client.store().subscribe();

    let mutation = create_post_with(&api, || -1000);
    let input = NewPost {
      user_id: 1,
      title: "Hello".into(),
      body: "World".into(),
    };
    let result = client.mutate(&mutation, input).await;

    assert_eq!(result, Err(SyncError::rejected("Title is required")));
    let after = client.store().get_data::<InfiniteData<Post>>(&keys::post_lists()).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert!(after.items().all(|p| p.id != -1000));

    let kinds: Vec<CacheEventKind> = std::iter::from_fn(|| events.try_recv().ok())
      .filter(|e| e.identity == keys::post_lists())
      .map(|e| e.kind)
      .collect();
    assert_eq!(kinds, vec![CacheEventKind::Updated, CacheEventKind::Restored]);

    let seen = notifier.take();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].level, Level::Error);
  }

  #[tokio::test]
  async fn test_create_keeps_provisional_post() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/posts"))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({
        "id": 101, "userId": 1, "title": "Hello", "body": "World"
      })))
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let client = QueryClient::default();
    seeded(&client, vec![Page::from_total(vec![post(1)], 1, 10, 11)]);

    let created = client
      .mutate(
        &create_post_with(&api, || -42),
        NewPost {
          user_id: 1,
          title: "Hello".into(),
          body: "World".into(),
        },
      )
      .await
      .unwrap();

    assert_eq!(created.id, 101);
    let entry = client.store().get::<InfiniteData<Post>>(&keys::post_lists()).unwrap();
    let data = entry.data.unwrap();
    assert_eq!(data.pages[0].items[0].id, -42);
    assert!(!data.pages[0].items[0].is_confirmed());
    assert_eq!(data.total_count(), Some(12));
    assert!(!entry.invalidated);
  }

  #[tokio::test]
  async fn test_create_requires_title() {
    let api = ApiClient::new("http://127.0.0.1:9", None).unwrap();
    let client = QueryClient::default();
    let err = client
      .mutate(
        &create_post(&api),
        NewPost {
          user_id: 1,
          title: " ".into(),
          body: "x".into(),
        },
      )
      .await
      .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert_eq!(err.to_string(), "title is required");
  }

  #[tokio::test]
  async fn test_delete_removes_detail_and_decrements_once() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
      .and(path("/posts/5"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
      .expect(1)
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let client = QueryClient::default();
    seeded(
      &client,
      vec![
        Page::from_total((1..=10).map(post).collect(), 1, 10, 25),
        Page::from_total((11..=20).map(post).collect(), 2, 10, 25),
      ],
    );
    client.set_query_data(&keys::post_detail(5), post(5));

    client.mutate(&delete_post(&api), 5).await.unwrap();

    let store = client.store();
    assert!(!store.contains(&keys::post_detail(5)));
    let entry = store.get::<InfiniteData<Post>>(&keys::post_lists()).unwrap();
    let data = entry.data.unwrap();
    assert!(data.items().all(|p| p.id != 5));
    assert_eq!(data.len(), 19);
    assert!(data.pages.iter().all(|p| p.total_count == Some(24)));
    assert!(!entry.invalidated);
  }

  #[tokio::test]
  async fn test_provisional_detail_is_never_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
      .expect(0)
      .mount(&server)
      .await;
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let client = QueryClient::default();

    let state = detail_query(&client, &api, -1000, true).load().await;
    assert_eq!(state.status, crate::cache::QueryStatus::Idle);
    assert!(!detail_options(&client, 0, true).enabled);
    assert!(!detail_options(&client, 3, false).enabled);
  }
}
