use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};

use crate::{
    dto::vacancy_dto::{VacancyListQuery, VacancyListResponse, VacancyResponse},
    error::Result,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/vacancies",
    params(
        ("broker" = Option<String>, Query, description = "Filter by broker name"),
        ("limit" = Option<usize>, Query, description = "Number of items to return")
    ),
    responses(
        (status = 200, description = "List of vacancies", body = Json<VacancyListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_vacancies(
    State(state): State<AppState>,
    Query(query): Query<VacancyListQuery>,
) -> Result<impl IntoResponse> {
    let mut vacancies = state.store.find_all().await?;
    if let Some(broker) = &query.broker {
        vacancies.retain(|vacancy| vacancy.broker_name.eq_ignore_ascii_case(broker));
    }
    let total = vacancies.len();
    if let Some(limit) = query.limit {
        vacancies.truncate(limit);
    }
    let items: Vec<VacancyResponse> = vacancies.into_iter().map(Into::into).collect();
    Ok(Json(VacancyListResponse { items, total }))
}
