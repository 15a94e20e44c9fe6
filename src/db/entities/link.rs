use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub url: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub date: ChronoDate,
    pub image_url: Option<String>,
    pub image_alt: Option<String>,
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

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::link_tag::Relation::Tag.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::link_tag::Relation::Link.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
