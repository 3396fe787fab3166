//! `SeaORM` Entity for rooms table (inventory read model)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rooms")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub apartment_id: i32,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::apartments::Entity",
        from = "Column::ApartmentId",
        to = "super::apartments::Column::Id",
        on_delete = "Cascade"
    )]
    Apartment,
    #[sea_orm(has_many = "super::beds::Entity")]
    Beds,
}

impl Related<super::apartments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Apartment.def()
    }
}

impl Related<super::beds::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Beds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
