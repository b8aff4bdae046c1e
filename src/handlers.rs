use crate::{
    AppState, CartEngine, credentials,
    error::{ApiError, CartError, ErrorBody},
    extract::{ApiJson, ApiPath},
    models::{
        ApiResponse, CartItem, CartLine, CartRequest, ChangePasswordRequest,
        CreateProductRequest, Identity, LoginRequest, LoginResponse, NewUser, Product,
        RegisterRequest, RemoveOutcome, Role, UpdateProductRequest, UpdateRoleRequest,
        UpdateUserRequest, User,
    },
};
use axum::{Json, extract::State, http::StatusCode};
use uuid::Uuid;

// --- Cart Handlers ---

/// get_cart
///
/// [Authenticated Route] Lists the caller's cart lines joined with product data.
#[utoipa::path(
    get,
    path = "/cart",
    responses(
        (status = 200, description = "Cart fetched", body = ApiResponse<Vec<CartItem>>),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn get_cart(
    identity: Identity,
    State(cart): State<CartEngine>,
) -> Result<Json<ApiResponse<Vec<CartItem>>>, CartError> {
    let items = cart.list(&identity).await?;
    Ok(Json(ApiResponse::new("Cart fetched", items)))
}

/// add_to_cart
///
/// [Authenticated Route] Adds one unit of a product. Unknown products are rejected
/// with 400 before anything is written.
#[utoipa::path(
    post,
    path = "/cart/add",
    request_body = CartRequest,
    responses(
        (status = 200, description = "Cart updated", body = ApiResponse<CartLine>),
        (status = 400, description = "Product does not exist or body invalid", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn add_to_cart(
    identity: Identity,
    State(cart): State<CartEngine>,
    ApiJson(payload): ApiJson<CartRequest>,
) -> Result<Json<ApiResponse<CartLine>>, CartError> {
    let line = cart.add(&identity, payload.product_id).await?;
    let message = if line.quantity == 1 {
        "Product added to cart"
    } else {
        "Cart updated"
    };
    Ok(Json(ApiResponse::new(message, line)))
}

/// remove_from_cart
///
/// [Authenticated Route] Takes one unit out. When the last unit goes, the response
/// says so and carries no `data`, because there is no line left to return.
#[utoipa::path(
    post,
    path = "/cart/remove",
    request_body = CartRequest,
    responses(
        (status = 200, description = "Cart updated or product removed", body = ApiResponse<CartLine>),
        (status = 400, description = "Product not in cart", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn remove_from_cart(
    identity: Identity,
    State(cart): State<CartEngine>,
    ApiJson(payload): ApiJson<CartRequest>,
) -> Result<Json<ApiResponse<CartLine>>, CartError> {
    let response = match cart.remove(&identity, payload.product_id).await? {
        RemoveOutcome::Decremented(line) => ApiResponse::new("Cart updated", line),
        RemoveOutcome::Removed => ApiResponse::message("Product removed from cart"),
    };
    Ok(Json(response))
}

/// clear_cart
///
/// [Authenticated Route] Empties the caller's cart. `data` is the number of lines removed.
#[utoipa::path(
    delete,
    path = "/cart/clear",
    responses(
        (status = 200, description = "Cart cleared", body = ApiResponse<u64>),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn clear_cart(
    identity: Identity,
    State(cart): State<CartEngine>,
) -> Result<Json<ApiResponse<u64>>, CartError> {
    let removed = cart.clear(&identity).await?;
    Ok(Json(ApiResponse::new("Cart cleared", removed)))
}

// --- Account Handlers ---

fn new_user(payload: RegisterRequest, role: Role) -> Result<NewUser, ApiError> {
    let name = payload.name.trim();
    let email = payload.email.trim();
    if name.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    }

    Ok(NewUser {
        name: name.to_string(),
        email: email.to_lowercase(),
        password_hash: credentials::hash_password(&payload.password)?,
        role,
    })
}

async fn create_account(
    state: &AppState,
    payload: RegisterRequest,
    role: Role,
) -> Result<User, ApiError> {
    let new_user = new_user(payload, role)?;
    let created = state.users.create_user(new_user).await?;

    created.ok_or_else(|| ApiError::Conflict("User with this email already exists".to_string()))
}

/// register
///
/// [Public Route] Creates a USER account. The role is fixed by the route.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = ApiResponse<User>),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 409, description = "Email taken", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let user = create_account(&state, payload, Role::User).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Registration Successful", user)),
    ))
}

/// staff_register
///
/// [Superuser Route] Creates a STAFF account.
#[utoipa::path(
    post,
    path = "/auth/staff-register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Staff registered", body = ApiResponse<User>),
        (status = 403, description = "Superuser only", body = ErrorBody),
        (status = 409, description = "Email taken", body = ErrorBody)
    )
)]
pub async fn staff_register(
    identity: Identity,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let user = create_account(&state, payload, Role::Staff).await?;
    tracing::info!(user_id = %user.id, created_by = %identity.id, "staff registered");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Staff Registration Successful", user)),
    ))
}

/// login
///
/// [Public Route] Exchanges email and password for a credential token. Unknown
/// email and wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login Successful", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Email/Password does not match", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let record = state
        .users
        .find_user_by_email(&email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !credentials::verify_password(&payload.password, &record.password_hash) {
        tracing::warn!(user_id = %record.user.id, "login rejected: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .tokens
        .issue(&record.user.identity(), state.config.token_ttl())?;

    tracing::info!(user_id = %record.user.id, role = %record.user.role, "login succeeded");
    Ok(Json(ApiResponse::new(
        "Login Successful",
        LoginResponse {
            token,
            user: record.user,
        },
    )))
}

/// get_me
///
/// [Authenticated Route] Echoes the identity carried by the caller's token.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses((status = 200, description = "Identity", body = Identity))
)]
pub async fn get_me(identity: Identity) -> Json<Identity> {
    Json(identity)
}

/// change_password
///
/// [Authenticated Route] Replaces the caller's password after checking the old one.
#[utoipa::path(
    post,
    path = "/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password successfully changed"),
        (status = 400, description = "Missing, wrong or unchanged password", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn change_password(
    identity: Identity,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if payload.old_password.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::BadRequest(
            "Both old and new password are required".to_string(),
        ));
    }

    let record = state
        .users
        .find_user_by_id(identity.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !credentials::verify_password(&payload.old_password, &record.password_hash) {
        tracing::warn!(user_id = %identity.id, "password change rejected: old password mismatch");
        return Err(ApiError::BadRequest(
            "Your old password does not match".to_string(),
        ));
    }

    if payload.old_password == payload.new_password {
        return Err(ApiError::BadRequest(
            "Old and new password cannot be the same".to_string(),
        ));
    }

    let password_hash = credentials::hash_password(&payload.new_password)?;
    if !state.users.update_password(identity.id, password_hash).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %identity.id, "password changed");
    Ok(Json(ApiResponse::message("Password successfully changed")))
}

/// staff_dashboard
///
/// [Staff Route] Guarded by the hierarchical staff-or-above policy.
#[utoipa::path(
    get,
    path = "/auth/staff-dashboard",
    responses(
        (status = 200, description = "Welcome", body = ApiResponse<Identity>),
        (status = 403, description = "Below staff", body = ErrorBody)
    )
)]
pub async fn staff_dashboard(identity: Identity) -> Json<ApiResponse<Identity>> {
    Json(ApiResponse::new("Welcome, staff or superuser!", identity))
}

/// admin_only
///
/// [Superuser Route] Guarded by set-membership `{SUPERUSER}`.
#[utoipa::path(
    get,
    path = "/auth/admin-only",
    responses(
        (status = 200, description = "Welcome", body = ApiResponse<Identity>),
        (status = 403, description = "Not a superuser", body = ErrorBody)
    )
)]
pub async fn admin_only(identity: Identity) -> Json<ApiResponse<Identity>> {
    Json(ApiResponse::new("Welcome, superuser!", identity))
}

// --- Product Handlers ---

/// list_products
///
/// [Public Route] The whole catalogue, newest first.
#[utoipa::path(
    get,
    path = "/products",
    responses((status = 200, description = "Products", body = [Product]))
)]
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.list_products().await?))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Found", body = Product),
        (status = 404, description = "Product not found", body = ErrorBody)
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Product>, ApiError> {
    state
        .catalog
        .get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))
}

/// create_product
///
/// [Staff Route] Set-membership `{STAFF, SUPERUSER}`. Titles are kept unique at
/// this layer (the column itself is not unique).
#[utoipa::path(
    post,
    path = "/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<Product>),
        (status = 400, description = "Invalid or duplicate", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody)
    )
)]
pub async fn create_product(
    identity: Identity,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), ApiError> {
    if payload.title.trim().is_empty() || payload.description.trim().is_empty() {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    }

    if state
        .catalog
        .find_product_by_title(&payload.title)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest(
            "Product title already exists".to_string(),
        ));
    }

    let product = state.catalog.create_product(payload).await?;
    tracing::info!(product_id = %product.id, created_by = %identity.id, "product created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new("Product created successfully", product)),
    ))
}

/// update_product
///
/// [Superuser Route] Partial update; omitted fields keep their stored values.
#[utoipa::path(
    put,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Product>),
        (status = 404, description = "Product not found", body = ErrorBody)
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateProductRequest>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    let product = state
        .catalog
        .update_product(id, payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    Ok(Json(ApiResponse::new("Product updated successfully", product)))
}

/// delete_product
///
/// [Superuser Route] Removing a product also removes every cart line pointing at it.
#[utoipa::path(
    delete,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<Product>),
        (status = 404, description = "Product not found", body = ErrorBody)
    )
)]
pub async fn delete_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    if !state.catalog.delete_product(id).await? {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }
    tracing::info!(product_id = %id, "product deleted");
    Ok(Json(ApiResponse::message("Product deleted successfully")))
}

// --- User Handlers ---

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

/// list_users
///
/// [Authenticated Route] Every account, without password hashes.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Users fetched", body = ApiResponse<Vec<User>>),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let users = state.users.list_users().await?;
    Ok(Json(ApiResponse::new("Users fetched", users)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User fetched", body = ApiResponse<User>),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let record = state
        .users
        .find_user_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(ApiResponse::new("User fetched", record.user)))
}

/// create_user
///
/// [Superuser Route] Creates a USER account on someone's behalf.
#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<User>),
        (status = 403, description = "Superuser only", body = ErrorBody),
        (status = 409, description = "Email taken", body = ErrorBody)
    )
)]
pub async fn create_user(
    identity: Identity,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let user = create_account(&state, payload, Role::User).await?;
    tracing::info!(user_id = %user.id, created_by = %identity.id, "user created");
    Ok((StatusCode::CREATED, Json(ApiResponse::new("User created", user))))
}

/// update_user
///
/// [Superuser Route] Changes name and/or email.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<User>),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Email taken", body = ErrorBody)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(mut payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    payload.name = payload.name.map(|name| name.trim().to_string());
    payload.email = payload.email.map(|email| email.trim().to_lowercase());
    if payload.name.as_deref() == Some("") || payload.email.as_deref() == Some("") {
        return Err(ApiError::BadRequest("Fields must not be empty".to_string()));
    }

    let user = state
        .users
        .update_user(id, payload)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(ApiResponse::new("User updated", user)))
}

/// update_role
///
/// [Superuser Route] Sets any account's role.
#[utoipa::path(
    put,
    path = "/users/update-role",
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "User role updated successfully", body = ApiResponse<User>),
        (status = 403, description = "Superuser only", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn update_role(
    identity: Identity,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateRoleRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state
        .users
        .update_role(payload.user_id, payload.role)
        .await?
        .ok_or_else(user_not_found)?;
    tracing::info!(user_id = %user.id, role = %user.role, changed_by = %identity.id, "role updated");
    Ok(Json(ApiResponse::new("User role updated successfully", user)))
}

/// delete_user
///
/// [Superuser Route] The account's cart goes with it.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    identity: Identity,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if !state.users.delete_user(id).await? {
        return Err(user_not_found());
    }
    tracing::info!(user_id = %id, deleted_by = %identity.id, "user deleted");
    Ok(Json(ApiResponse::message("User deleted")))
}

/// user_staff_dashboard
///
/// [Staff Route] Exact set `{STAFF}`: a superuser is turned away here.
#[utoipa::path(
    get,
    path = "/users/staff-dashboard",
    responses(
        (status = 200, description = "Welcome", body = ApiResponse<Identity>),
        (status = 403, description = "Staff only", body = ErrorBody)
    )
)]
pub async fn user_staff_dashboard(identity: Identity) -> Json<ApiResponse<Identity>> {
    Json(ApiResponse::new("Welcome to the STAFF dashboard", identity))
}
