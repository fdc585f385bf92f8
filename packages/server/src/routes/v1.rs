use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::{event, submission};
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/events", event_routes())
        .nest("/submissions", submission_routes())
}

fn event_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(event::list_events, event::create_event))
        .routes(routes!(
            event::get_event,
            event::update_event,
            event::delete_event
        ))
        .routes(routes!(event::apply_event_action))
        .routes(routes!(event::join_event))
        .routes(routes!(event::leave_event))
        .routes(routes!(event::list_participants))
        .routes(routes!(event::get_leaderboard))
        .routes(routes!(event::get_my_best))
        .routes(routes!(event::get_event_stats))
        .routes(routes!(submission::create_submission))
        .routes(routes!(submission::list_my_submissions))
}

fn submission_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(submission::list_pending))
        .routes(routes!(
            submission::get_submission,
            submission::withdraw_submission
        ))
        .routes(routes!(submission::update_notes))
        .routes(routes!(submission::approve_submission))
        .routes(routes!(submission::reject_submission))
        .routes(routes!(submission::disqualify_submission))
}
