pub mod link_routes;
pub mod post_routes;
pub mod tag_routes;
