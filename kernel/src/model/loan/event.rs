use crate::model::{
    actor::Actor,
    id::{BookId, LoanId, ReservationId, UserId},
};

#[derive(Debug)]
pub struct CreateLoan {
    pub user_id: UserId,
    pub book_id: BookId,
    pub loan_period_days: i64,
    // オファー済み予約を行使する貸出のときに指定する。
    // 指定があると在庫チェックを行わず、確保済みの一冊を消費する。
    pub reservation_id: Option<ReservationId>,
}

#[derive(Debug)]
pub struct ReturnLoan {
    pub loan_id: LoanId,
    pub actor: Actor,
}
