//! 蔵書行のロックとカウンタ操作の共通部品。
//! 蔵書の available_copies・status と、その蔵書の貸出・予約レコードは
//! ひとつの整合性ドメインであり、必ず蔵書行の排他ロックの下で変更する。

use chrono::{DateTime, Duration, Utc};
use kernel::{
    lifecycle,
    model::reservation::{Reservation, ReservationStatus},
};
use shared::error::{AppError, AppResult};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::database::model::{book::BookRow, reservation::ReservationRow};

// 蔵書行の排他ロックを取得する。同じ蔵書への貸出・返却・予約操作は
// ここで直列化される。
pub(crate) async fn lock_book(
    tx: &mut Transaction<'_, Postgres>,
    book_id: Uuid,
) -> AppResult<Option<BookRow>> {
    sqlx::query_as::<_, BookRow>(
        r#"
            SELECT book_id, isbn, title, author, total_copies, available_copies, status
            FROM books
            WHERE book_id = $1
            FOR UPDATE
        "#,
    )
    .bind(book_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(AppError::SpecificOperationError)
}

// 条件付き減算。0 を下回る場合は行が更新されず false を返す。
pub(crate) async fn decrement_available(
    tx: &mut Transaction<'_, Postgres>,
    book_id: Uuid,
) -> AppResult<bool> {
    let res = sqlx::query(
        r#"
            UPDATE books
            SET available_copies = available_copies - 1
            WHERE book_id = $1 AND available_copies > 0
        "#,
    )
    .bind(book_id)
    .execute(&mut **tx)
    .await
    .map_err(AppError::SpecificOperationError)?;
    Ok(res.rows_affected() == 1)
}

// 条件付き加算。total_copies を超える場合は行が更新されず false を返す。
// 超過は返却経路のバグか破損データの兆候なので、呼び出し側は
// クランプせず ConsistencyViolation にすること。
pub(crate) async fn increment_available(
    tx: &mut Transaction<'_, Postgres>,
    book_id: Uuid,
) -> AppResult<bool> {
    let res = sqlx::query(
        r#"
            UPDATE books
            SET available_copies = available_copies + 1
            WHERE book_id = $1 AND available_copies < total_copies
        "#,
    )
    .bind(book_id)
    .execute(&mut **tx)
    .await
    .map_err(AppError::SpecificOperationError)?;
    Ok(res.rows_affected() == 1)
}

// 現在の在庫数からステータスを引き直す。導出規則は kernel::lifecycle が唯一の定義。
pub(crate) async fn refresh_book_status(
    tx: &mut Transaction<'_, Postgres>,
    book_id: Uuid,
) -> AppResult<()> {
    let row = sqlx::query_as::<_, BookRow>(
        r#"
            SELECT book_id, isbn, title, author, total_copies, available_copies, status
            FROM books
            WHERE book_id = $1
        "#,
    )
    .bind(book_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(AppError::SpecificOperationError)?;

    let current = row.status()?;
    let next = lifecycle::book_status_for(row.available_copies, current);
    if next != current {
        sqlx::query("UPDATE books SET status = $2 WHERE book_id = $1")
            .bind(book_id)
            .bind(next.as_ref())
            .execute(&mut **tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
    }
    Ok(())
}

// 空いた一冊を予約キューの先頭へ引き渡す。呼び出し時点で蔵書行ロックを
// 保持していること。オファーした一冊はその場で在庫から差し引いて確保し、
// 新規の貸出が予約を追い越せないようにする。
pub(crate) async fn offer_next_pending(
    tx: &mut Transaction<'_, Postgres>,
    book_id: Uuid,
    now: DateTime<Utc>,
    offer_window_days: i64,
) -> AppResult<Option<Reservation>> {
    let rows = sqlx::query_as::<_, ReservationRow>(
        r#"
            SELECT reservation_id, book_id, user_id, priority, requested_at, offer_expires_at, status
            FROM reservations
            WHERE book_id = $1 AND status = 'pending'
        "#,
    )
    .bind(book_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(AppError::SpecificOperationError)?;

    let mut pending = rows
        .into_iter()
        .map(Reservation::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    pending.sort_by(lifecycle::queue_order);
    let Some(head) = pending.into_iter().next() else {
        return Ok(None);
    };

    lifecycle::check_reservation_transition(head.status, ReservationStatus::Offered)?;
    let expires_at = now + Duration::days(offer_window_days);
    sqlx::query(
        r#"
            UPDATE reservations
            SET status = 'offered', offer_expires_at = $2
            WHERE reservation_id = $1
        "#,
    )
    .bind(head.id.raw())
    .bind(expires_at)
    .execute(&mut **tx)
    .await
    .map_err(AppError::SpecificOperationError)?;

    if !decrement_available(tx, book_id).await? {
        return Err(AppError::ConsistencyViolation(format!(
            "book {book_id}: no available copy to earmark for reservation {}",
            head.id
        )));
    }
    refresh_book_status(tx, book_id).await?;

    Ok(Some(Reservation {
        status: ReservationStatus::Offered,
        offer_expires_at: Some(expires_at),
        ..head
    }))
}
