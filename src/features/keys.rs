//! Query identities used across features. Lists and details share a prefix
//! so a whole resource can be invalidated at once.

use crate::api::products::ProductQuery;
use crate::cache::QueryIdentity;

pub fn posts() -> QueryIdentity {
  QueryIdentity::new("posts")
}

/// The infinite post list lives under this single identity.
pub fn post_lists() -> QueryIdentity {
  posts().with("list")
}

pub fn post_details() -> QueryIdentity {
  posts().with("detail")
}

pub fn post_detail(id: i64) -> QueryIdentity {
  post_details().with(id)
}

pub fn cart() -> QueryIdentity {
  QueryIdentity::new("cart")
}

pub fn shop_products() -> QueryIdentity {
  QueryIdentity::new("shop-products")
}

pub fn product_detail(id: &str) -> QueryIdentity {
  QueryIdentity::new("product-detail").with(id)
}

pub fn shop_courses() -> QueryIdentity {
  QueryIdentity::new("shop-courses")
}

/// Every catalogue listing, whatever its filters.
pub fn product_lists() -> QueryIdentity {
  QueryIdentity::new("products")
}

pub fn products(params: &ProductQuery) -> QueryIdentity {
  product_lists().with(params.to_param())
}

/// Public product page, addressed by slug.
pub fn product(slug: &str) -> QueryIdentity {
  QueryIdentity::new("product").with(slug)
}

pub fn landing_page() -> QueryIdentity {
  QueryIdentity::new("landing-page")
}

pub fn my_profile() -> QueryIdentity {
  QueryIdentity::new("my-profile")
}

pub fn my_shop() -> QueryIdentity {
  QueryIdentity::new("my-shop")
}
