use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use derive_new::new;
use kernel::{
    lifecycle,
    model::{
        book::{AvailabilitySnapshot, Book},
        id::{BookId, LoanId, UserId},
        loan::{
            event::{CreateLoan, ReturnLoan},
            Loan, LoanStatus, ReturnOutcome,
        },
        reservation::ReservationStatus,
    },
    repository::circulation::CirculationRepository,
};
use shared::error::{AppError, AppResult};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    database::{
        model::{
            book::AvailabilityRow,
            loan::LoanRow,
            reservation::ReservationRow,
        },
        ConnectionPool,
    },
    redis::{model::AvailabilityKey, RedisClient},
    repository::common,
};

#[derive(new)]
pub struct CirculationRepositoryImpl {
    db: ConnectionPool,
    kv: Arc<RedisClient>,
    snapshot_ttl_seconds: u64,
    offer_window_days: i64,
}

const LOAN_COLUMNS: &str =
    "loan_id, book_id, user_id, borrowed_at, due_at, returned_at, status";

#[async_trait]
impl CirculationRepository for CirculationRepositoryImpl {
    async fn borrow(&self, event: CreateLoan) -> AppResult<Loan> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // 蔵書行の排他ロック。在庫チェックから貸出レコード挿入までを直列化する。
        let book = common::lock_book(&mut tx, event.book_id.raw())
            .await?
            .ok_or_else(|| AppError::EntityNotFound(format!("book not found: {}", event.book_id)))?;
        let book = Book::try_from(book)?;

        if !lifecycle::borrowable(book.status) {
            return Err(AppError::OutOfStock(format!(
                "book is not circulating: {} ({})",
                event.book_id,
                book.status.as_ref()
            )));
        }

        // 在庫チェックが先、二重貸出チェックが後。オファー行使時は
        // 一冊を確保済みなので在庫チェックは適用しない。
        if event.reservation_id.is_none() && book.available_copies <= 0 {
            return Err(AppError::OutOfStock(format!(
                "no available copy of book: {}",
                event.book_id
            )));
        }

        // 同一利用者の二重貸出はロック下で再チェックする
        let duplicates: i64 = sqlx::query_scalar(
            r#"
                SELECT COUNT(*) FROM loans
                WHERE book_id = $1 AND user_id = $2 AND status IN ('active', 'overdue')
            "#,
        )
        .bind(event.book_id.raw())
        .bind(event.user_id.raw())
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        if duplicates > 0 {
            return Err(AppError::DuplicateLoan(format!(
                "user {} already borrowed book {}",
                event.user_id, event.book_id
            )));
        }

        match event.reservation_id {
            None => {
                // 通常の貸出。確保済み（オファー中）の一冊は available_copies から
                // すでに差し引かれているので、ここで取り合いになることはない。
                if !common::decrement_available(&mut tx, event.book_id.raw()).await? {
                    return Err(AppError::OutOfStock(format!(
                        "no available copy of book: {}",
                        event.book_id
                    )));
                }
                common::refresh_book_status(&mut tx, event.book_id.raw()).await?;
            }
            Some(reservation_id) => {
                // 予約オファーの行使。在庫はオファー時点で確保済みなので
                // 減算せず、予約を Fulfilled に倒すだけにする。
                self.consume_offer(&mut tx, reservation_id.raw(), &event)
                    .await?;
            }
        }

        let loan = Loan {
            id: LoanId::new(),
            user_id: event.user_id,
            book_id: event.book_id,
            borrowed_at: now,
            due_at: now + Duration::days(event.loan_period_days),
            returned_at: None,
            status: LoanStatus::Active,
        };
        sqlx::query(
            r#"
                INSERT INTO loans (loan_id, book_id, user_id, borrowed_at, due_at, status)
                VALUES ($1, $2, $3, $4, $5, 'active')
            "#,
        )
        .bind(loan.id.raw())
        .bind(loan.book_id.raw())
        .bind(loan.user_id.raw())
        .bind(loan.borrowed_at)
        .bind(loan.due_at)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(loan)
    }

    async fn return_loan(&self, event: ReturnLoan) -> AppResult<ReturnOutcome> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // ロック順序は全経路で 貸出行 → 蔵書行 に固定する（デッドロック防止）
        let loan_row = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE loan_id = $1 FOR UPDATE"
        ))
        .bind(event.loan_id.raw())
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .ok_or_else(|| AppError::EntityNotFound(format!("loan not found: {}", event.loan_id)))?;
        let loan = Loan::try_from(loan_row)?;

        if !matches!(loan.status, LoanStatus::Active | LoanStatus::Overdue) {
            return Err(AppError::NotBorrowed(format!(
                "loan is already settled: {}",
                loan.id
            )));
        }
        if event.actor.id != loan.user_id && !event.actor.is_admin() {
            return Err(AppError::ForbiddenOperation);
        }

        let book_id = loan.book_id.raw();
        common::lock_book(&mut tx, book_id).await?.ok_or_else(|| {
            AppError::ConsistencyViolation(format!("loan {} references missing book", loan.id))
        })?;

        let res = sqlx::query(
            "UPDATE loans SET status = 'returned', returned_at = $2 WHERE loan_id = $1",
        )
        .bind(loan.id.raw())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;
        if res.rows_affected() < 1 {
            return Err(AppError::NoRowAffectedError(
                "no returning record has been updated".into(),
            ));
        }

        // total_copies を超える加算は破損の兆候。クランプせず失敗させ、
        // audit_and_repair に委ねる。
        if !common::increment_available(&mut tx, book_id).await? {
            return Err(AppError::ConsistencyViolation(format!(
                "book {}: available_copies would exceed total_copies",
                loan.book_id
            )));
        }
        common::refresh_book_status(&mut tx, book_id).await?;

        // 空いた一冊は同一トランザクション内で予約キューの先頭へ回す
        let offered =
            common::offer_next_pending(&mut tx, book_id, now, self.offer_window_days).await?;

        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(ReturnOutcome {
            loan: Loan {
                status: LoanStatus::Returned,
                returned_at: Some(now),
                ..loan
            },
            offered,
        })
    }

    async fn mark_overdue_loans(&self, now: DateTime<Utc>) -> AppResult<u64> {
        // 既に overdue の行には触れないので再実行しても安全
        let res = sqlx::query(
            "UPDATE loans SET status = 'overdue' WHERE status = 'active' AND due_at < $1",
        )
        .bind(now)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        Ok(res.rows_affected())
    }

    async fn find_loan(&self, loan_id: LoanId) -> AppResult<Option<Loan>> {
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE loan_id = $1"
        ))
        .bind(loan_id.raw())
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        row.map(Loan::try_from).transpose()
    }

    async fn find_active_by_user(&self, user_id: UserId) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>(&format!(
            r#"
                SELECT {LOAN_COLUMNS} FROM loans
                WHERE user_id = $1 AND status IN ('active', 'overdue')
                ORDER BY borrowed_at DESC
            "#
        ))
        .bind(user_id.raw())
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        rows.into_iter().map(Loan::try_from).collect()
    }

    async fn find_unreturned_all(&self) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>(&format!(
            r#"
                SELECT {LOAN_COLUMNS} FROM loans
                WHERE status IN ('active', 'overdue')
                ORDER BY due_at ASC
            "#
        ))
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        rows.into_iter().map(Loan::try_from).collect()
    }

    // 表示専用の読み取り経路。キャッシュを経由してよいのはここだけで、
    // 貸出可否の判断は必ずトランザクション内の再チェックが行う。
    async fn availability(&self, book_id: BookId) -> AppResult<Option<AvailabilitySnapshot>> {
        let key = AvailabilityKey(book_id).inner();
        match self.kv.get(&key).await {
            Ok(Some(raw)) => {
                if let Ok(snapshot) = serde_json::from_str::<AvailabilitySnapshot>(&raw) {
                    return Ok(Some(snapshot));
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error.cause_chain = ?e, "availability cache read failed"),
        }

        let row = sqlx::query_as::<_, AvailabilityRow>(
            r#"
                SELECT
                    b.total_copies,
                    b.available_copies,
                    b.status,
                    (
                        SELECT COUNT(*) FROM reservations r
                        WHERE r.book_id = b.book_id AND r.status = 'pending'
                    ) AS pending_reservations
                FROM books b
                WHERE b.book_id = $1
            "#,
        )
        .bind(book_id.raw())
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;
        let Some(row) = row else { return Ok(None) };

        let snapshot = AvailabilitySnapshot {
            book_id,
            total_copies: row.total_copies,
            available_copies: row.available_copies,
            status: std::str::FromStr::from_str(&row.status).map_err(|_| {
                AppError::ConversionEntityError(format!("invalid book status: {}", row.status))
            })?,
            pending_reservations: row.pending_reservations,
        };
        if let Ok(json) = serde_json::to_string(&snapshot) {
            if let Err(e) = self.kv.set_ex(&key, &json, self.snapshot_ttl_seconds).await {
                tracing::warn!(error.cause_chain = ?e, "availability cache write failed");
            }
        }
        Ok(Some(snapshot))
    }
}

impl CirculationRepositoryImpl {
    async fn consume_offer(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        reservation_id: Uuid,
        event: &CreateLoan,
    ) -> AppResult<()> {
        // 蔵書行ロックは取得済みなので、予約行はこの下で安定している
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
                SELECT reservation_id, book_id, user_id, priority, requested_at, offer_expires_at, status
                FROM reservations
                WHERE reservation_id = $1
            "#,
        )
        .bind(reservation_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::SpecificOperationError)?
        .ok_or_else(|| {
            AppError::EntityNotFound(format!("reservation not found: {reservation_id}"))
        })?;
        let reservation = kernel::model::reservation::Reservation::try_from(row)?;

        if reservation.book_id != event.book_id || reservation.user_id != event.user_id {
            return Err(AppError::ForbiddenOperation);
        }
        if reservation.status != ReservationStatus::Offered {
            return Err(AppError::EntityNotFound(format!(
                "reservation is not offered: {reservation_id}"
            )));
        }
        lifecycle::check_reservation_transition(
            reservation.status,
            ReservationStatus::Fulfilled,
        )?;

        sqlx::query("UPDATE reservations SET status = 'fulfilled' WHERE reservation_id = $1")
            .bind(reservation_id)
            .execute(&mut **tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kernel::model::{
        actor::{Actor, ActorRole},
        book::BookStatus,
        id::ReservationId,
    };
    use shared::config::RedisConfig;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

    use super::*;

    fn repo(pool: sqlx::PgPool) -> CirculationRepositoryImpl {
        let kv = Arc::new(
            RedisClient::new(&RedisConfig {
                host: "localhost".into(),
                port: 6379,
            })
            .unwrap(),
        );
        CirculationRepositoryImpl::new(ConnectionPool::new(pool), kv, 300, 7)
    }

    async fn insert_book(
        pool: &sqlx::PgPool,
        total: i32,
        available: i32,
        status: &str,
    ) -> BookId {
        let book_id = BookId::new();
        sqlx::query(
            r#"
                INSERT INTO books (book_id, isbn, title, author, total_copies, available_copies, status)
                VALUES ($1, $2, 'テスト蔵書', 'テスト著者', $3, $4, $5)
            "#,
        )
        .bind(book_id.raw())
        .bind(book_id.raw().simple().to_string())
        .bind(total)
        .bind(available)
        .bind(status)
        .execute(pool)
        .await
        .unwrap();
        book_id
    }

    fn member(user_id: UserId) -> Actor {
        Actor {
            id: user_id,
            role: ActorRole::Member,
        }
    }

    async fn book_state(pool: &sqlx::PgPool, book_id: BookId) -> (i32, String) {
        sqlx::query_as::<_, (i32, String)>(
            "SELECT available_copies, status FROM books WHERE book_id = $1",
        )
        .bind(book_id.raw())
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn borrow_last_copy_marks_book_fully_borrowed(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let r = repo(pool.clone());
        let book_id = insert_book(&pool, 1, 1, "available").await;
        let user_a = UserId::new();
        let user_b = UserId::new();

        let loan = r
            .borrow(CreateLoan {
                user_id: user_a,
                book_id,
                loan_period_days: 30,
                reservation_id: None,
            })
            .await?;
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.due_at, loan.borrowed_at + Duration::days(30));

        let (available, status) = book_state(&pool, book_id).await;
        assert_eq!(available, 0);
        assert_eq!(status, "fully_borrowed");

        // 在庫ゼロの蔵書は二人目には貸せない
        let err = r
            .borrow(CreateLoan {
                user_id: user_b,
                book_id,
                loan_period_days: 30,
                reservation_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::OutOfStock(_)));
        Ok(())
    }

    #[sqlx::test]
    async fn duplicate_borrow_is_rejected(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let r = repo(pool.clone());
        let book_id = insert_book(&pool, 3, 3, "available").await;
        let user_id = UserId::new();

        r.borrow(CreateLoan {
            user_id,
            book_id,
            loan_period_days: 14,
            reservation_id: None,
        })
        .await?;
        let err = r
            .borrow(CreateLoan {
                user_id,
                book_id,
                loan_period_days: 14,
                reservation_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateLoan(_)));

        // 二重貸出が拒否されても在庫は一冊分しか減っていない
        let (available, _) = book_state(&pool, book_id).await;
        assert_eq!(available, 2);
        Ok(())
    }

    #[sqlx::test]
    async fn borrow_is_gated_by_book_status(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let r = repo(pool.clone());
        let book_id = insert_book(&pool, 2, 2, "maintenance").await;

        let err = r
            .borrow(CreateLoan {
                user_id: UserId::new(),
                book_id,
                loan_period_days: 30,
                reservation_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::OutOfStock(_)));
        Ok(())
    }

    #[sqlx::test]
    async fn double_return_increments_only_once(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let r = repo(pool.clone());
        let book_id = insert_book(&pool, 2, 2, "available").await;
        let user_id = UserId::new();

        let loan = r
            .borrow(CreateLoan {
                user_id,
                book_id,
                loan_period_days: 30,
                reservation_id: None,
            })
            .await?;

        let outcome = r
            .return_loan(ReturnLoan {
                loan_id: loan.id,
                actor: member(user_id),
            })
            .await?;
        assert_eq!(outcome.loan.status, LoanStatus::Returned);
        assert!(outcome.loan.returned_at.is_some());
        assert!(outcome.offered.is_none());

        // クライアントのリトライを想定した二度目の返却は NotBorrowed
        let err = r
            .return_loan(ReturnLoan {
                loan_id: loan.id,
                actor: member(user_id),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotBorrowed(_)));

        let (available, status) = book_state(&pool, book_id).await;
        assert_eq!(available, 2);
        assert_eq!(status, "available");
        Ok(())
    }

    #[sqlx::test]
    async fn return_by_other_member_is_forbidden(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let r = repo(pool.clone());
        let book_id = insert_book(&pool, 1, 1, "available").await;
        let borrower = UserId::new();

        let loan = r
            .borrow(CreateLoan {
                user_id: borrower,
                book_id,
                loan_period_days: 30,
                reservation_id: None,
            })
            .await?;

        let err = r
            .return_loan(ReturnLoan {
                loan_id: loan.id,
                actor: member(UserId::new()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ForbiddenOperation));

        // 管理者による代理返却は許可される
        r.return_loan(ReturnLoan {
            loan_id: loan.id,
            actor: Actor {
                id: UserId::new(),
                role: ActorRole::Admin,
            },
        })
        .await?;
        Ok(())
    }

    #[sqlx::test]
    async fn return_hands_copy_to_reservation_queue(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let r = repo(pool.clone());
        let book_id = insert_book(&pool, 1, 1, "available").await;
        let borrower = UserId::new();
        let requester = UserId::new();

        let loan = r
            .borrow(CreateLoan {
                user_id: borrower,
                book_id,
                loan_period_days: 30,
                reservation_id: None,
            })
            .await?;

        let reservation_id = ReservationId::new();
        sqlx::query(
            r#"
                INSERT INTO reservations (reservation_id, book_id, user_id, priority, requested_at, status)
                VALUES ($1, $2, $3, 0, $4, 'pending')
            "#,
        )
        .bind(reservation_id.raw())
        .bind(book_id.raw())
        .bind(requester.raw())
        .bind(Utc::now())
        .execute(&pool)
        .await?;

        let outcome = r
            .return_loan(ReturnLoan {
                loan_id: loan.id,
                actor: member(borrower),
            })
            .await?;
        let offered = outcome.offered.expect("head of the queue should be offered");
        assert_eq!(offered.id, reservation_id);
        assert_eq!(offered.status, ReservationStatus::Offered);
        assert!(offered.offer_expires_at.is_some());

        // 返された一冊はオファーの裏付けとして確保され、飛び込みには回らない
        let (available, status) = book_state(&pool, book_id).await;
        assert_eq!(available, 0);
        assert_eq!(status, "fully_borrowed");
        Ok(())
    }

    #[sqlx::test]
    async fn offered_reservation_can_be_converted_to_loan(
        pool: sqlx::PgPool,
    ) -> anyhow::Result<()> {
        let r = repo(pool.clone());
        let book_id = insert_book(&pool, 1, 1, "available").await;
        let borrower = UserId::new();
        let requester = UserId::new();

        let loan = r
            .borrow(CreateLoan {
                user_id: borrower,
                book_id,
                loan_period_days: 30,
                reservation_id: None,
            })
            .await?;

        let reservation_id = ReservationId::new();
        sqlx::query(
            r#"
                INSERT INTO reservations (reservation_id, book_id, user_id, priority, requested_at, status)
                VALUES ($1, $2, $3, 0, $4, 'pending')
            "#,
        )
        .bind(reservation_id.raw())
        .bind(book_id.raw())
        .bind(requester.raw())
        .bind(Utc::now())
        .execute(&pool)
        .await?;
        r.return_loan(ReturnLoan {
            loan_id: loan.id,
            actor: member(borrower),
        })
        .await?;

        // オファーの行使。確保済みの一冊を消費するので在庫は減らない
        let loan = r
            .borrow(CreateLoan {
                user_id: requester,
                book_id,
                loan_period_days: 30,
                reservation_id: Some(reservation_id),
            })
            .await?;
        assert_eq!(loan.user_id, requester);

        let (available, _) = book_state(&pool, book_id).await;
        assert_eq!(available, 0);
        let status: String =
            sqlx::query_scalar("SELECT status FROM reservations WHERE reservation_id = $1")
                .bind(reservation_id.raw())
                .fetch_one(&pool)
                .await?;
        assert_eq!(status, "fulfilled");

        // 行使済みオファーの再利用はできない
        let err = r
            .borrow(CreateLoan {
                user_id: requester,
                book_id,
                loan_period_days: 30,
                reservation_id: Some(reservation_id),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::DuplicateLoan(_) | AppError::EntityNotFound(_)
        ));
        Ok(())
    }

    #[sqlx::test]
    async fn mark_overdue_loans_is_idempotent(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let r = repo(pool.clone());
        let book_id = insert_book(&pool, 2, 2, "available").await;
        let user_id = UserId::new();

        let loan = r
            .borrow(CreateLoan {
                user_id,
                book_id,
                loan_period_days: 7,
                reservation_id: None,
            })
            .await?;
        sqlx::query("UPDATE loans SET due_at = $2 WHERE loan_id = $1")
            .bind(loan.id.raw())
            .bind(Utc::now() - Duration::days(3))
            .execute(&pool)
            .await?;

        let now = Utc::now();
        assert_eq!(r.mark_overdue_loans(now).await?, 1);
        // 既に overdue の行は対象にならない
        assert_eq!(r.mark_overdue_loans(now).await?, 0);

        let marked = r.find_loan(loan.id).await?.unwrap();
        assert_eq!(marked.status, LoanStatus::Overdue);
        assert_eq!(marked.days_overdue(now), 3);
        Ok(())
    }

    #[sqlx::test]
    async fn availability_reports_counts_and_queue_length(
        pool: sqlx::PgPool,
    ) -> anyhow::Result<()> {
        let r = repo(pool.clone());
        let book_id = insert_book(&pool, 3, 2, "available").await;
        sqlx::query(
            r#"
                INSERT INTO reservations (reservation_id, book_id, user_id, priority, requested_at, status)
                VALUES ($1, $2, $3, 0, $4, 'pending')
            "#,
        )
        .bind(ReservationId::new().raw())
        .bind(book_id.raw())
        .bind(UserId::new().raw())
        .bind(Utc::now())
        .execute(&pool)
        .await?;

        let snapshot = r.availability(book_id).await?.unwrap();
        assert_eq!(snapshot.total_copies, 3);
        assert_eq!(snapshot.available_copies, 2);
        assert_eq!(snapshot.status, BookStatus::Available);
        assert_eq!(snapshot.pending_reservations, 1);

        assert!(r.availability(BookId::new()).await?.is_none());
        Ok(())
    }

    // 在庫 k 冊に対して N 人（N > k）が同時に借りると、ちょうど k 人が成功し
    // 残りは OutOfStock になる。蔵書行ロックが直列化を保証する。
    #[sqlx::test]
    async fn concurrent_borrows_never_oversell(
        pool_opts: PgPoolOptions,
        conn_opts: PgConnectOptions,
    ) -> anyhow::Result<()> {
        let pool = pool_opts.max_connections(8).connect_with(conn_opts).await?;
        let r = Arc::new(repo(pool.clone()));
        let book_id = insert_book(&pool, 3, 3, "available").await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let r = Arc::clone(&r);
            handles.push(tokio::spawn(async move {
                r.borrow(CreateLoan {
                    user_id: UserId::new(),
                    book_id,
                    loan_period_days: 30,
                    reservation_id: None,
                })
                .await
            }));
        }

        let mut ok = 0;
        let mut out_of_stock = 0;
        for handle in handles {
            match handle.await? {
                Ok(_) => ok += 1,
                Err(AppError::OutOfStock(_)) => out_of_stock += 1,
                Err(e) => return Err(e.into()),
            }
        }
        assert_eq!(ok, 3);
        assert_eq!(out_of_stock, 1);

        let (available, status) = book_state(&pool, book_id).await;
        assert_eq!(available, 0);
        assert_eq!(status, "fully_borrowed");
        let loans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND status = 'active'",
        )
        .bind(book_id.raw())
        .fetch_one(&pool)
        .await?;
        assert_eq!(loans, 3);
        Ok(())
    }

    #[sqlx::test]
    async fn find_active_by_user_excludes_returned(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let r = repo(pool.clone());
        let user_id = UserId::new();
        let first = insert_book(&pool, 1, 1, "available").await;
        let second = insert_book(&pool, 1, 1, "available").await;

        let kept = r
            .borrow(CreateLoan {
                user_id,
                book_id: first,
                loan_period_days: 30,
                reservation_id: None,
            })
            .await?;
        let returned = r
            .borrow(CreateLoan {
                user_id,
                book_id: second,
                loan_period_days: 30,
                reservation_id: None,
            })
            .await?;
        r.return_loan(ReturnLoan {
            loan_id: returned.id,
            actor: member(user_id),
        })
        .await?;

        let active = r.find_active_by_user(user_id).await?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, kept.id);
        Ok(())
    }
}
