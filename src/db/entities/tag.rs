use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A tag is its own identifier; there is no separate display name.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::link_tag::Entity")]
    LinkTag,
}

impl Related<super::link_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LinkTag.def()
    }
}

impl Related<super::link::Entity> for Entity {
    fn to() -> RelationDef {
        super::link_tag::Relation::Link.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::link_tag::Relation::Tag.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
