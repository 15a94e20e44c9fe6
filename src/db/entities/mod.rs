//! SeaORM entities for the catalog tables.

pub mod link;
pub mod link_tag;
pub mod tag;

pub mod prelude {
    pub use super::link::ActiveModel as LinkActiveModel;
    pub use super::link::Column as LinkColumn;
    pub use super::link::Entity as Link;
    pub use super::link::Model as LinkModel;

    pub use super::tag::ActiveModel as TagActiveModel;
    pub use super::tag::Column as TagColumn;
    pub use super::tag::Entity as Tag;
    pub use super::tag::Model as TagModel;

    pub use super::link_tag::ActiveModel as LinkTagActiveModel;
    pub use super::link_tag::Column as LinkTagColumn;
    pub use super::link_tag::Entity as LinkTag;
    pub use super::link_tag::Model as LinkTagModel;
}
