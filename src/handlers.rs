use axum::{
    Form,
    extract::{Path, State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    auth::{AUTH_SESSION_KEY, AuthUser},
    error::{AppError, AppResult},
    models::{LoginForm, SignupForm, SnippetCreateForm},
    render::{FLASH_SESSION_KEY, PageContext, SnippetView, TemplateData},
    repository::StoreError,
};

/// render
///
/// Hands the page to the configured renderer.
fn render(state: &AppState, status: StatusCode, page: &str, data: &TemplateData) -> AppResult<Response> {
    Ok(state.renderer.render(status, page, data)?)
}

/// Unwraps a decoded form body. An undecodable body is the client's fault.
fn decode_form<T>(form: Result<Form<T>, FormRejection>) -> AppResult<T> {
    match form {
        Ok(Form(form)) => Ok(form),
        Err(rejection) => {
            tracing::debug!("form rejected: {}", rejection);
            Err(AppError::Client(StatusCode::BAD_REQUEST))
        }
    }
}

fn form_value<T: serde::Serialize>(form: &T) -> AppResult<Option<serde_json::Value>> {
    let value = serde_json::to_value(form).map_err(crate::render::RenderError::from)?;
    Ok(Some(value))
}

/// ping
///
/// Liveness check. Sits outside the session chain.
pub async fn ping() -> &'static str {
    "pong"
}

/// home
///
/// [Public Route] Lists the latest visible snippets.
pub async fn home(State(state): State<AppState>, page: PageContext) -> AppResult<Response> {
    let snippets = state.snippets.latest().await?;

    let mut data = page.template_data(state.clock.now()).await?;
    data.snippets = snippets.into_iter().map(SnippetView::from).collect();

    render(&state, StatusCode::OK, "home", &data)
}

/// snippet_view
///
/// [Public Route] Shows one snippet. Ids that are not positive integers, unknown ids and
/// expired snippets all answer 404.
pub async fn snippet_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    page: PageContext,
) -> AppResult<Response> {
    let id = match id.parse::<i64>() {
        Ok(id) if id >= 1 => id,
        _ => {
            tracing::debug!(id = %id, "rejecting malformed snippet id");
            return Err(AppError::Client(StatusCode::NOT_FOUND));
        }
    };

    let snippet = state.snippets.get(id).await?;

    let mut data = page.template_data(state.clock.now()).await?;
    data.snippet = Some(SnippetView::from(snippet));

    render(&state, StatusCode::OK, "view", &data)
}

/// snippet_create
///
/// [Authenticated Route] The blank creation form.
pub async fn snippet_create(State(state): State<AppState>, page: PageContext) -> AppResult<Response> {
    let mut data = page.template_data(state.clock.now()).await?;
    data.form = form_value(&SnippetCreateForm::default())?;

    render(&state, StatusCode::OK, "create", &data)
}

/// snippet_create_post
///
/// [Authenticated Route] Validates and stores a new snippet, then redirects to it.
pub async fn snippet_create_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    page: PageContext,
    form: Result<Form<SnippetCreateForm>, FormRejection>,
) -> AppResult<Response> {
    let mut form = decode_form(form)?;

    if !form.validate() {
        let mut data = page.template_data(state.clock.now()).await?;
        data.form = form_value(&form)?;
        return render(&state, StatusCode::UNPROCESSABLE_ENTITY, "create", &data);
    }

    let id = state
        .snippets
        .insert(&form.title, &form.content, form.expires)
        .await?;
    tracing::info!(snippet_id = id, user_id = auth_user.id, "snippet created");

    page.session
        .insert(FLASH_SESSION_KEY, "Snippet successfully created!")
        .await?;
    Ok(Redirect::to(&format!("/snippets/view/{id}")).into_response())
}

/// signup_form
///
/// [Public Route] The blank signup form.
pub async fn signup_form(State(state): State<AppState>, page: PageContext) -> AppResult<Response> {
    let mut data = page.template_data(state.clock.now()).await?;
    data.form = form_value(&SignupForm::default())?;

    render(&state, StatusCode::OK, "signup", &data)
}

/// signup
///
/// [Public Route] Creates an account. A taken email is reported on the form itself
/// and ends the request there.
pub async fn signup(
    State(state): State<AppState>,
    page: PageContext,
    form: Result<Form<SignupForm>, FormRejection>,
) -> AppResult<Response> {
    let mut form = decode_form(form)?;

    if !form.validate() {
        let mut data = page.template_data(state.clock.now()).await?;
        data.form = form_value(&form)?;
        return render(&state, StatusCode::UNPROCESSABLE_ENTITY, "signup", &data);
    }

    match state.users.insert(&form.name, &form.email, &form.password).await {
        Ok(()) => {}
        Err(StoreError::DuplicateEmail) => {
            tracing::info!("signup rejected: email already registered");
            form.validator
                .add_field_error("email", "Email address is already in use");

            let mut data = page.template_data(state.clock.now()).await?;
            data.form = form_value(&form)?;
            return render(&state, StatusCode::UNPROCESSABLE_ENTITY, "signup", &data);
        }
        Err(e) => return Err(e.into()),
    }

    page.session
        .insert(FLASH_SESSION_KEY, "Your signup was successful. Please log in.")
        .await?;
    Ok(Redirect::to("/users/login").into_response())
}

/// login_form
///
/// [Public Route] The blank login form.
pub async fn login_form(State(state): State<AppState>, page: PageContext) -> AppResult<Response> {
    let mut data = page.template_data(state.clock.now()).await?;
    data.form = form_value(&LoginForm::default())?;

    render(&state, StatusCode::OK, "login", &data)
}

/// login
///
/// [Public Route] Checks the credentials and, on success, rotates the session token and
/// records the user id. The old token is gone at once; the new one is only written, user
/// id included, when the response leaves the session layer without a server error.
pub async fn login(
    State(state): State<AppState>,
    page: PageContext,
    form: Result<Form<LoginForm>, FormRejection>,
) -> AppResult<Response> {
    let mut form = decode_form(form)?;

    if !form.validate() {
        let mut data = page.template_data(state.clock.now()).await?;
        data.form = form_value(&form)?;
        return render(&state, StatusCode::UNPROCESSABLE_ENTITY, "login", &data);
    }

    let user_id = match state.users.authenticate(&form.email, &form.password).await {
        Ok(user_id) => user_id,
        Err(StoreError::InvalidCredentials) => {
            tracing::warn!("login failed: invalid credentials");
            form.validator
                .add_non_field_error("Email or password is incorrect");

            let mut data = page.template_data(state.clock.now()).await?;
            data.form = form_value(&form)?;
            return render(&state, StatusCode::UNPROCESSABLE_ENTITY, "login", &data);
        }
        Err(e) => return Err(e.into()),
    };

    page.session.cycle_id().await?;
    page.session.insert(AUTH_SESSION_KEY, user_id).await?;
    tracing::info!(user_id, "user logged in");

    Ok(Redirect::to("/snippets/create").into_response())
}

/// logout
///
/// [Authenticated Route] Rotates the token, forgets the user id and says goodbye.
pub async fn logout(auth_user: AuthUser, page: PageContext) -> AppResult<Response> {
    page.session.cycle_id().await?;
    page.session.remove::<i64>(AUTH_SESSION_KEY).await?;
    page.session
        .insert(FLASH_SESSION_KEY, "You've been logged out successfully!")
        .await?;
    tracing::info!(user_id = auth_user.id, "user logged out");

    Ok(Redirect::to("/").into_response())
}
