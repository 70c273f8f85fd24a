use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_new::new;
use kernel::{
    lifecycle,
    model::{
        book::{Book, BookStatus},
        id::{BookId, ReservationId, UserId},
        reservation::{
            event::{CancelReservation, CreateReservation},
            CancelOutcome, ExpiredOffer, Reservation, ReservationStatus,
        },
    },
    repository::reservation::ReservationRepository,
};
use shared::error::{AppError, AppResult};
use uuid::Uuid;

use crate::{
    database::{model::reservation::ReservationRow, ConnectionPool},
    repository::common,
};

#[derive(new)]
pub struct ReservationRepositoryImpl {
    db: ConnectionPool,
    offer_window_days: i64,
}

const RESERVATION_COLUMNS: &str =
    "reservation_id, book_id, user_id, priority, requested_at, offer_expires_at, status";

#[async_trait]
impl ReservationRepository for ReservationRepositoryImpl {
    async fn create(&self, event: CreateReservation) -> AppResult<Reservation> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let book = common::lock_book(&mut tx, event.book_id.raw())
            .await?
            .ok_or_else(|| AppError::EntityNotFound(format!("book not found: {}", event.book_id)))?;
        let book = Book::try_from(book)?;

        // 失われた蔵書・在庫ゼロ運用のタイトルへの予約は受け付けない
        if book.total_copies <= 0 || book.status == BookStatus::Lost {
            return Err(AppError::EntityNotFound(format!(
                "book is not circulating: {}",
                event.book_id
            )));
        }
        // 在庫があるなら予約ではなくそのまま借りればよい
        if book.available_copies > 0 {
            return Err(AppError::AlreadyAvailable(format!(
                "book has available copies: {}",
                event.book_id
            )));
        }

        let open: i64 = sqlx::query_scalar(
            r#"
                SELECT COUNT(*) FROM reservations
                WHERE book_id = $1 AND user_id = $2 AND status IN ('pending', 'offered')
            "#,
        )
        .bind(event.book_id.raw())
        .bind(event.user_id.raw())
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        if open > 0 {
            return Err(AppError::DuplicateReservation(format!(
                "user {} already queued for book {}",
                event.user_id, event.book_id
            )));
        }

        let reservation = Reservation {
            id: ReservationId::new(),
            user_id: event.user_id,
            book_id: event.book_id,
            priority: event.priority,
            requested_at: now,
            offer_expires_at: None,
            status: ReservationStatus::Pending,
        };
        sqlx::query(
            r#"
                INSERT INTO reservations (reservation_id, book_id, user_id, priority, requested_at, status)
                VALUES ($1, $2, $3, $4, $5, 'pending')
            "#,
        )
        .bind(reservation.id.raw())
        .bind(reservation.book_id.raw())
        .bind(reservation.user_id.raw())
        .bind(reservation.priority)
        .bind(reservation.requested_at)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(reservation)
    }

    async fn cancel(&self, event: CancelReservation) -> AppResult<CancelOutcome> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // まずロックなしで蔵書を特定し、ロックは常に蔵書行から取る
        let book_id: Uuid = sqlx::query_scalar(
            "SELECT book_id FROM reservations WHERE reservation_id = $1",
        )
        .bind(event.reservation_id.raw())
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .ok_or_else(|| {
            AppError::EntityNotFound(format!("reservation not found: {}", event.reservation_id))
        })?;

        common::lock_book(&mut tx, book_id).await?.ok_or_else(|| {
            AppError::ConsistencyViolation(format!(
                "reservation {} references missing book",
                event.reservation_id
            ))
        })?;

        // 蔵書行ロックの下で読み直す
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE reservation_id = $1"
        ))
        .bind(event.reservation_id.raw())
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        let reservation = Reservation::try_from(row)?;

        if reservation.status.is_settled() {
            return Err(AppError::EntityNotFound(format!(
                "reservation already settled: {}",
                reservation.id
            )));
        }
        if event.actor.id != reservation.user_id && !event.actor.is_admin() {
            return Err(AppError::ForbiddenOperation);
        }
        lifecycle::check_reservation_transition(reservation.status, ReservationStatus::Cancelled)?;

        sqlx::query("UPDATE reservations SET status = 'cancelled' WHERE reservation_id = $1")
            .bind(reservation.id.raw())
            .execute(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

        // オファー済みだった場合は確保していた一冊を戻し、次の待ちへ回す
        let offered = if reservation.status == ReservationStatus::Offered {
            release_earmarked_copy(&mut tx, book_id, &reservation).await?;
            common::offer_next_pending(&mut tx, book_id, now, self.offer_window_days).await?
        } else {
            None
        };

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(CancelOutcome {
            cancelled: Reservation {
                status: ReservationStatus::Cancelled,
                ..reservation
            },
            offered,
        })
    }

    async fn expire_offers(&self, now: DateTime<Utc>) -> AppResult<Vec<ExpiredOffer>> {
        // 対象の蔵書を洗い出し、蔵書ごとに独立したトランザクションで処理する
        let book_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
                SELECT DISTINCT book_id FROM reservations
                WHERE status = 'offered' AND offer_expires_at < $1
            "#,
        )
        .bind(now)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        let mut changes = Vec::new();
        for book_id in book_ids {
            let mut tx = self.db.begin().await?;
            if common::lock_book(&mut tx, book_id).await?.is_none() {
                continue;
            }

            // ロック下で読み直す。並走する掃除が先に処理していればここで空になり、
            // 同じ一冊を二重に解放することはない。
            let rows = sqlx::query_as::<_, ReservationRow>(&format!(
                r#"
                    SELECT {RESERVATION_COLUMNS} FROM reservations
                    WHERE book_id = $1 AND status = 'offered' AND offer_expires_at < $2
                "#
            ))
            .bind(book_id)
            .bind(now)
            .fetch_all(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

            for row in rows {
                let reservation = Reservation::try_from(row)?;
                lifecycle::check_reservation_transition(
                    reservation.status,
                    ReservationStatus::Expired,
                )?;
                sqlx::query("UPDATE reservations SET status = 'expired' WHERE reservation_id = $1")
                    .bind(reservation.id.raw())
                    .execute(&mut *tx)
                    .await
                    .map_err(AppError::SpecificOperationError)?;
                release_earmarked_copy(&mut tx, book_id, &reservation).await?;

                // 解放した一冊は次の待ちへカスケードする
                let offered =
                    common::offer_next_pending(&mut tx, book_id, now, self.offer_window_days)
                        .await?;
                changes.push(ExpiredOffer {
                    reservation: Reservation {
                        status: ReservationStatus::Expired,
                        ..reservation
                    },
                    offered,
                });
            }
            tx.commit().await.map_err(AppError::TransactionError)?;
        }
        Ok(changes)
    }

    async fn find_expired_offers(&self, now: DateTime<Utc>) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
                SELECT {RESERVATION_COLUMNS} FROM reservations
                WHERE status = 'offered' AND offer_expires_at < $1
                ORDER BY offer_expires_at ASC
            "#
        ))
        .bind(now)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        rows.into_iter().map(Reservation::try_from).collect()
    }

    async fn queue_position(&self, book_id: BookId, user_id: UserId) -> AppResult<Option<i64>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE book_id = $1 AND status = 'pending'"
        ))
        .bind(book_id.raw())
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        let mut pending = rows
            .into_iter()
            .map(Reservation::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        // 待ち順位の定義は kernel::lifecycle の比較器が唯一の定義
        pending.sort_by(lifecycle::queue_order);
        Ok(pending
            .iter()
            .position(|r| r.user_id == user_id)
            .map(|i| i as i64 + 1))
    }

    async fn find_for_book(&self, book_id: BookId) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
                SELECT {RESERVATION_COLUMNS} FROM reservations
                WHERE book_id = $1 AND status IN ('pending', 'offered')
            "#
        ))
        .bind(book_id.raw())
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        let mut open = rows
            .into_iter()
            .map(Reservation::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        // 一冊を確保しているオファーを先頭に、残りは待ち順に並べる
        open.sort_by(|a, b| {
            let a_offered = a.status == ReservationStatus::Offered;
            let b_offered = b.status == ReservationStatus::Offered;
            b_offered
                .cmp(&a_offered)
                .then_with(|| lifecycle::queue_order(a, b))
        });
        Ok(open)
    }
}

// オファーの裏付けとして確保していた一冊を在庫へ戻す
async fn release_earmarked_copy(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    book_id: Uuid,
    reservation: &Reservation,
) -> AppResult<()> {
    if !common::increment_available(tx, book_id).await? {
        return Err(AppError::ConsistencyViolation(format!(
            "book {book_id}: releasing reservation {} would exceed total_copies",
            reservation.id
        )));
    }
    common::refresh_book_status(tx, book_id).await
}
