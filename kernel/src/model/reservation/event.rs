use crate::model::{
    actor::Actor,
    id::{BookId, ReservationId, UserId},
};

#[derive(Debug)]
pub struct CreateReservation {
    pub user_id: UserId,
    pub book_id: BookId,
    pub priority: i32,
}

#[derive(Debug)]
pub struct CancelReservation {
    pub reservation_id: ReservationId,
    pub actor: Actor,
}
