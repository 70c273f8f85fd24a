//! 蔵書・貸出・予約の導出状態をここで一元的に定義する。
//! ライブの貸出・返却経路と audit_and_repair の両方が必ずこのモジュールを通る。

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use shared::error::{AppError, AppResult};

use crate::model::{
    book::BookStatus,
    loan::LoanStatus,
    reservation::{Reservation, ReservationStatus},
};

// available_copies から蔵書ステータスを導出する。
// Maintenance / Lost は上書きステータスなのでそのまま維持する。
pub fn book_status_for(available_copies: i32, current: BookStatus) -> BookStatus {
    if current.is_override() {
        return current;
    }
    if available_copies > 0 {
        BookStatus::Available
    } else {
        BookStatus::FullyBorrowed
    }
}

// ステータスが貸出を許すか。在庫数のチェックは別途トランザクション内で行う。
pub fn borrowable(status: BookStatus) -> bool {
    !status.is_override()
}

pub fn is_overdue(status: LoanStatus, due_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match status {
        LoanStatus::Overdue => true,
        LoanStatus::Active => now > due_at,
        LoanStatus::Returned => false,
    }
}

pub fn days_overdue(status: LoanStatus, due_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    if is_overdue(status, due_at, now) {
        (now - due_at).num_days().max(0)
    } else {
        0
    }
}

// 予約の状態遷移表。ここにない遷移はコード側のバグなので ConsistencyViolation にする。
pub fn check_reservation_transition(
    from: ReservationStatus,
    to: ReservationStatus,
) -> AppResult<()> {
    use ReservationStatus::*;
    let allowed = matches!(
        (from, to),
        (Pending, Offered)
            | (Pending, Cancelled)
            | (Offered, Fulfilled)
            | (Offered, Cancelled)
            | (Offered, Expired)
    );
    if allowed {
        Ok(())
    } else {
        Err(AppError::ConsistencyViolation(format!(
            "reservation transition {} -> {}",
            from.as_ref(),
            to.as_ref()
        )))
    }
}

// 予約キューの順序: 優先度の高い順、同順位は先着順
pub fn queue_order(a: &Reservation, b: &Reservation) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.requested_at.cmp(&b.requested_at))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::id::{BookId, ReservationId, UserId};

    #[test]
    fn book_status_follows_available_copies() {
        assert_eq!(
            book_status_for(1, BookStatus::FullyBorrowed),
            BookStatus::Available
        );
        assert_eq!(
            book_status_for(0, BookStatus::Available),
            BookStatus::FullyBorrowed
        );
    }

    #[test]
    fn override_status_is_sticky() {
        assert_eq!(
            book_status_for(3, BookStatus::Maintenance),
            BookStatus::Maintenance
        );
        assert_eq!(book_status_for(0, BookStatus::Lost), BookStatus::Lost);
        assert!(!borrowable(BookStatus::Maintenance));
        assert!(!borrowable(BookStatus::Lost));
        assert!(borrowable(BookStatus::Available));
    }

    #[test]
    fn overdue_is_strictly_after_due_at() {
        let due = Utc::now();
        assert!(!is_overdue(LoanStatus::Active, due, due));
        assert!(is_overdue(
            LoanStatus::Active,
            due,
            due + Duration::seconds(1)
        ));
        assert!(is_overdue(LoanStatus::Overdue, due, due - Duration::days(1)));
        assert!(!is_overdue(
            LoanStatus::Returned,
            due,
            due + Duration::days(10)
        ));
    }

    #[test]
    fn days_overdue_floors_to_whole_days() {
        let due = Utc::now();
        assert_eq!(days_overdue(LoanStatus::Active, due, due), 0);
        assert_eq!(
            days_overdue(LoanStatus::Active, due, due + Duration::hours(30)),
            1
        );
        assert_eq!(
            days_overdue(LoanStatus::Active, due, due + Duration::days(3)),
            3
        );
        assert_eq!(
            days_overdue(LoanStatus::Returned, due, due + Duration::days(3)),
            0
        );
    }

    #[test]
    fn reservation_transition_table() {
        use ReservationStatus::*;
        assert!(check_reservation_transition(Pending, Offered).is_ok());
        assert!(check_reservation_transition(Pending, Cancelled).is_ok());
        assert!(check_reservation_transition(Offered, Fulfilled).is_ok());
        assert!(check_reservation_transition(Offered, Cancelled).is_ok());
        assert!(check_reservation_transition(Offered, Expired).is_ok());
        // 終端状態からは動かせない
        assert!(check_reservation_transition(Fulfilled, Offered).is_err());
        assert!(check_reservation_transition(Expired, Offered).is_err());
        assert!(check_reservation_transition(Pending, Fulfilled).is_err());
        assert!(check_reservation_transition(Pending, Expired).is_err());
    }

    fn reservation(priority: i32, requested_at: DateTime<Utc>) -> Reservation {
        Reservation {
            id: ReservationId::new(),
            user_id: UserId::new(),
            book_id: BookId::new(),
            priority,
            requested_at,
            offer_expires_at: None,
            status: ReservationStatus::Pending,
        }
    }

    #[test]
    fn queue_orders_by_priority_then_request_time() {
        let base = Utc::now();
        let low_early = reservation(0, base);
        let low_late = reservation(0, base + Duration::minutes(5));
        let high_late = reservation(10, base + Duration::minutes(10));

        let mut queue = vec![low_late.clone(), high_late.clone(), low_early.clone()];
        queue.sort_by(queue_order);

        let ids: Vec<_> = queue.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![high_late.id, low_early.id, low_late.id]);
    }
}
