use crate::api::home::{self, LandingPage};
use crate::api::ApiClient;
use crate::query::{Query, QueryClient};

use super::keys;

pub fn landing_page_query(client: &QueryClient, api: &ApiClient) -> Query<LandingPage> {
  let api = api.clone();
  Query::new(client.clone(), keys::landing_page(), client.query_options(), move || {
    let api = api.clone();
    async move { home::get_landing_page(&api).await }
  })
}
