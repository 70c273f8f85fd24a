use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use kernel::{model::id::BookId, notification::NotificationEvent};
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

use crate::{
    extractor::AuthorizedActor,
    handler::run_post_commit,
    model::{
        audit::{
            AuditRequest, OfferSweepQuery, OfferSweepResponse, OverdueSweepResponse,
            ReminderSweepResponse, RepairReportResponse,
        },
        reservation::ReservationResponse,
    },
};

// 返却期限の何日前から督促予告を送るか
const DUE_SOON_WINDOW_DAYS: i64 = 3;

fn ensure_admin(user: &AuthorizedActor) -> AppResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::ForbiddenOperation)
    }
}

// 延滞の一括反映。スケジューラから定期的に叩かれる想定
pub async fn mark_overdue(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<OverdueSweepResponse>> {
    ensure_admin(&user)?;
    let marked = registry
        .circulation_repository()
        .mark_overdue_loans(Utc::now())
        .await?;
    tracing::info!(marked, "overdue sweep finished");
    Ok(Json(OverdueSweepResponse { marked }))
}

// 期限切れオファーの回収。dryRun=true なら対象の列挙だけで状態は変えない
pub async fn sweep_offers(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
    Query(query): Query<OfferSweepQuery>,
) -> AppResult<Json<OfferSweepResponse>> {
    ensure_admin(&user)?;
    let now = Utc::now();

    if query.dry_run {
        let candidates = registry
            .reservation_repository()
            .find_expired_offers(now)
            .await?;
        return Ok(Json(OfferSweepResponse {
            dry_run: true,
            expired: candidates.into_iter().map(Into::into).collect(),
            offered: vec![],
        }));
    }

    let outcomes = registry.reservation_repository().expire_offers(now).await?;
    let mut expired = Vec::new();
    let mut offered = Vec::new();
    for outcome in outcomes {
        let book_id = outcome.reservation.book_id;
        let mut events = Vec::new();
        if let Some(next) = &outcome.offered {
            events.push(NotificationEvent::ReservationAvailable {
                reservation: next.clone(),
            });
        }
        run_post_commit(
            registry.post_commit_hooks(),
            &registry.notification_dispatcher(),
            book_id,
            events,
        )
        .await;
        expired.push(outcome.reservation.into());
        if let Some(next) = outcome.offered {
            offered.push(next.into());
        }
    }
    tracing::info!(
        expired = expired.len(),
        cascaded = offered.len(),
        "offer sweep finished"
    );
    Ok(Json(OfferSweepResponse {
        dry_run: false,
        expired,
        offered,
    }))
}

// 在庫カウンタの検査と修復。book_id 省略時は全蔵書を走査する
pub async fn run_audit(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
    Json(req): Json<AuditRequest>,
) -> AppResult<Json<RepairReportResponse>> {
    ensure_admin(&user)?;
    let report = registry
        .audit_repository()
        .audit_and_repair(req.book_id)
        .await?;
    for entry in &report.corrections {
        run_post_commit(
            registry.post_commit_hooks(),
            &registry.notification_dispatcher(),
            entry.book_id,
            vec![],
        )
        .await;
    }
    if !report.is_clean() {
        tracing::warn!(
            corrections = report.corrections.len(),
            "audit repaired inconsistent books"
        );
    }
    Ok(Json(report.into()))
}

// 蔵書の予約キューの中身を確認する。他の利用者の予約が見えるので管理者限定
pub async fn show_book_queue(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
    Path(book_id): Path<BookId>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    ensure_admin(&user)?;
    let open = registry
        .reservation_repository()
        .find_for_book(book_id)
        .await?;
    Ok(Json(open.into_iter().map(Into::into).collect()))
}

// 督促通知の起点。期限切れには延滞通知、期限が近い貸出には予告を送る
pub async fn send_reminders(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<ReminderSweepResponse>> {
    ensure_admin(&user)?;
    let now = Utc::now();
    let loans = registry.circulation_repository().find_unreturned_all().await?;

    let dispatcher = registry.notification_dispatcher();
    let mut due_soon = 0;
    let mut overdue = 0;
    for loan in loans {
        let event = if loan.is_overdue(now) {
            overdue += 1;
            NotificationEvent::OverdueReminder {
                days_overdue: loan.days_overdue(now),
                loan,
            }
        } else {
            let days_left = (loan.due_at - now).num_days();
            if days_left > DUE_SOON_WINDOW_DAYS {
                continue;
            }
            due_soon += 1;
            NotificationEvent::DueSoonReminder { loan, days_left }
        };
        if let Err(e) = dispatcher.dispatch(event).await {
            tracing::warn!(error.cause_chain = ?e, "reminder dispatch failed");
        }
    }
    Ok(Json(ReminderSweepResponse { due_soon, overdue }))
}
