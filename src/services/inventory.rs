//! Read/write access to the listing inventory (apartment → room → bed)
//!
//! Listing management owns these tables; the booking core only reads
//! beds and flips their cached status.

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};

use crate::entities::beds::{self, BedStatus};
use crate::entities::prelude::*;

/// A bed together with the apartment facts the booking core needs
#[derive(Debug, Clone)]
pub struct BedListing {
    pub bed: beds::Model,
    pub apartment_id: i32,
    pub owner_id: i32,
    pub apartment_active: bool,
}

impl BedListing {
    pub fn is_bookable(&self) -> bool {
        self.apartment_active && self.bed.is_available()
    }
}

pub async fn get_bed<C: ConnectionTrait>(db: &C, bed_id: i32) -> Result<Option<BedListing>, DbErr> {
    let Some((bed, room)) = Beds::find_by_id(bed_id)
        .find_also_related(Rooms)
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let Some(room) = room else {
        tracing::warn!(bed_id, "Bed has no room");
        return Ok(None);
    };

    let Some(apartment) = Apartments::find_by_id(room.apartment_id).one(db).await? else {
        tracing::warn!(bed_id, room_id = room.id, "Room has no apartment");
        return Ok(None);
    };

    Ok(Some(BedListing {
        bed,
        apartment_id: apartment.id,
        owner_id: apartment.owner_id,
        apartment_active: apartment.is_active,
    }))
}

/// Owner of the apartment a bed belongs to
pub async fn owner_of_bed<C: ConnectionTrait>(db: &C, bed_id: i32) -> Result<Option<i32>, DbErr> {
    Ok(get_bed(db, bed_id).await?.map(|listing| listing.owner_id))
}

pub async fn set_bed_status<C: ConnectionTrait>(
    db: &C,
    bed_id: i32,
    status: BedStatus,
) -> Result<(), DbErr> {
    set_beds_status(db, &[bed_id], status).await
}

pub async fn set_beds_status<C: ConnectionTrait>(
    db: &C,
    bed_ids: &[i32],
    status: BedStatus,
) -> Result<(), DbErr> {
    if bed_ids.is_empty() {
        return Ok(());
    }

    Beds::update_many()
        .set(beds::ActiveModel {
            status: Set(status),
            ..Default::default()
        })
        .filter(beds::Column::Id.is_in(bed_ids.iter().copied()))
        .exec(db)
        .await?;

    tracing::debug!(?bed_ids, ?status, "Bed status updated");
    Ok(())
}
