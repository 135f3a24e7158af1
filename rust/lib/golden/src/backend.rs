//! In-process LabTrack backend for golden tests.
//!
//! Serves both the auth and the system routes from one axum router, issues
//! HS256 tokens, and counts refresh calls so tests can assert on them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use labtrack_client::{
    Accessory, Computer, Lab, PartStatusUpdate, Report, ReportKind, Resource, User,
};

pub const JWT_SECRET: &str = "golden-labtrack-secret";
pub const USERNAME: &str = "ana";
pub const PASSWORD: &str = "golden-pw";
pub const REFRESH_COOKIE: &str = "refresh_token_cookie";
pub const REFRESH_SECRET: &str = "golden-refresh-credential";
pub const CSRF_VALUE: &str = "golden-csrf";

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    iat: i64,
    exp: i64,
    jti: String,
    access_level: u8,
}

struct Shared {
    refresh_calls: AtomicUsize,
    refresh_fails: AtomicBool,
    refresh_delay_ms: AtomicU64,
    reject_all: AtomicBool,
    account_fails: AtomicBool,
    login_ttl: AtomicI64,
    next_jti: AtomicU64,
    tables: Mutex<HashMap<&'static str, Table>>,
    statuses: Mutex<BTreeMap<i64, Map<String, Value>>>,
    account: Mutex<Map<String, Value>>,
    settings: Mutex<Map<String, Value>>,
}

impl Shared {
    fn mint(&self, ttl: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            sub: USERNAME.to_string(),
            iat: now,
            exp: now + ttl,
            jti: self.next_jti.fetch_add(1, Ordering::Relaxed).to_string(),
            access_level: 0,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<TokenClaims, Fail> {
        if self.reject_all.load(Ordering::SeqCst) {
            return Err(Fail::new(StatusCode::UNAUTHORIZED, "Token has been revoked"));
        }
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(Fail::new(StatusCode::UNAUTHORIZED, "Missing Authorization Header"))?;

        let mut validation = Validation::default();
        validation.leeway = 0;
        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|_| Fail::new(StatusCode::UNAUTHORIZED, "Token has expired"))
    }
}

/// Error reply in the backend's `{"msg": ...}` shape.
struct Fail(StatusCode, String);

impl Fail {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Fail(status, msg.into())
    }
}

impl IntoResponse for Fail {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "msg": self.1 }))).into_response()
    }
}

type Reply = Result<Response, Fail>;

/// A running backend. The server task lives until the runtime shuts down.
pub struct Backend {
    pub base_url: String,
    shared: Arc<Shared>,
}

impl Backend {
    pub async fn start() -> std::io::Result<Backend> {
        let shared = Arc::new(Shared {
            refresh_calls: AtomicUsize::new(0),
            refresh_fails: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            reject_all: AtomicBool::new(false),
            account_fails: AtomicBool::new(false),
            login_ttl: AtomicI64::new(3600),
            next_jti: AtomicU64::new(1),
            tables: Mutex::new(HashMap::new()),
            statuses: Mutex::new(BTreeMap::new()),
            account: Mutex::new(default_account()),
            settings: Mutex::new(Map::new()),
        });

        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/logout", post(logout))
            .route("/auth/refresh", post(refresh))
            .route("/accounts/", put(edit_account))
            .route("/accounts/me", get(account))
            .route("/account_settings/", get(settings))
            .route("/account_settings", put(edit_settings))
            .route("/computers/statuses", get(part_statuses))
            .route("/computers/{key}/status", put(set_part_status));
        let app = collection::<Lab>(app);
        let app = collection::<Computer>(app);
        let app = collection::<Accessory>(app);
        let app = collection::<Report>(app);
        let app = collection::<User>(app).with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Backend { base_url, shared })
    }

    /// A token signed by this backend, valid for `ttl` seconds (negative
    /// for one that already expired).
    pub fn token(&self, ttl: i64) -> String {
        self.shared.mint(ttl).unwrap_or_default()
    }

    /// Cookie header a logged-in browser would hold.
    pub fn refresh_cookies(&self) -> String {
        format!("{REFRESH_COOKIE}={REFRESH_SECRET}; csrf_refresh_token={CSRF_VALUE}")
    }

    pub fn refresh_calls(&self) -> usize {
        self.shared.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.shared.refresh_fails.store(fail, Ordering::SeqCst);
    }

    /// Hold every refresh response for `delay`.
    pub fn delay_refresh(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.shared.refresh_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Answer 401 to every authenticated route, whatever the token.
    pub fn reject_all(&self, reject: bool) {
        self.shared.reject_all.store(reject, Ordering::SeqCst);
    }

    pub fn fail_account(&self, fail: bool) {
        self.shared.account_fails.store(fail, Ordering::SeqCst);
    }

    /// Lifetime of tokens issued by login. Refresh always issues an hour.
    pub fn set_login_ttl(&self, ttl: i64) {
        self.shared.login_ttl.store(ttl, Ordering::SeqCst);
    }

    /// Store a report row exactly as given, tagged with who filed it.
    /// Returns the assigned id.
    pub fn seed_report(&self, kind: ReportKind, mut row: Map<String, Value>) -> i64 {
        row.insert("kind".into(), json!(kind.as_str()));
        lock(&self.shared.tables)
            .entry(Report::PATH)
            .or_default()
            .push(row)
    }
}

fn default_account() -> Map<String, Value> {
    let mut account = Map::new();
    account.insert("id".into(), json!(1));
    account.insert("username".into(), json!(USERNAME));
    account.insert("email".into(), json!("ana@school.edu"));
    account.insert("access_level".into(), json!(0));
    account
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn token_reply(token: String) -> Response {
    Json(json!({ "tkn_acc": token })).into_response()
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (k, v) = pair.trim().split_once('=')?;
            (k == name).then_some(v)
        })
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(State(s): State<Arc<Shared>>, Json(body): Json<LoginRequest>) -> Reply {
    if body.username != USERNAME || body.password != PASSWORD {
        return Err(Fail::new(StatusCode::UNAUTHORIZED, "Invalid username or password"));
    }
    let token = s
        .mint(s.login_ttl.load(Ordering::SeqCst))
        .map_err(|_| Fail::new(StatusCode::INTERNAL_SERVER_ERROR, "token signing failed"))?;

    let mut resp = token_reply(token);
    let headers = resp.headers_mut();
    headers.append(
        SET_COOKIE,
        HeaderValue::from_static("refresh_token_cookie=golden-refresh-credential; Path=/; HttpOnly"),
    );
    headers.append(
        SET_COOKIE,
        HeaderValue::from_static("csrf_refresh_token=golden-csrf; Path=/"),
    );
    Ok(resp)
}

async fn logout(State(s): State<Arc<Shared>>, headers: HeaderMap) -> Reply {
    s.authorize(&headers)?;
    Ok(Json(json!({ "msg": "logout successful" })).into_response())
}

async fn refresh(State(s): State<Arc<Shared>>, headers: HeaderMap) -> Reply {
    s.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = s.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if s.refresh_fails.load(Ordering::SeqCst) {
        return Err(Fail::new(StatusCode::UNAUTHORIZED, "Token has expired"));
    }
    if cookie_value(&headers, REFRESH_COOKIE) != Some(REFRESH_SECRET) {
        return Err(Fail::new(StatusCode::UNAUTHORIZED, "Missing cookie \"refresh_token_cookie\""));
    }
    let csrf = headers.get("X-CSRF-TOKEN").and_then(|v| v.to_str().ok());
    if csrf != Some(CSRF_VALUE) {
        return Err(Fail::new(StatusCode::UNAUTHORIZED, "CSRF double submit tokens do not match"));
    }

    let token = s
        .mint(3600)
        .map_err(|_| Fail::new(StatusCode::INTERNAL_SERVER_ERROR, "token signing failed"))?;
    Ok(token_reply(token))
}

async fn account(State(s): State<Arc<Shared>>, headers: HeaderMap) -> Reply {
    s.authorize(&headers)?;
    if s.account_fails.load(Ordering::SeqCst) {
        return Err(Fail::new(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable"));
    }
    let account = lock(&s.account).clone();
    Ok(Json(json!({ "data": [account] })).into_response())
}

#[derive(Deserialize)]
struct DataBody {
    data: Map<String, Value>,
}

async fn edit_account(
    State(s): State<Arc<Shared>>,
    headers: HeaderMap,
    Json(body): Json<DataBody>,
) -> Reply {
    s.authorize(&headers)?;
    lock(&s.account).extend(body.data);
    Ok(Json(json!({ "msg": "account updated" })).into_response())
}

async fn settings(State(s): State<Arc<Shared>>, headers: HeaderMap) -> Reply {
    s.authorize(&headers)?;
    let settings = lock(&s.settings).clone();
    Ok(Json(json!({ "data": settings })).into_response())
}

async fn edit_settings(
    State(s): State<Arc<Shared>>,
    headers: HeaderMap,
    Json(body): Json<Map<String, Value>>,
) -> Reply {
    s.authorize(&headers)?;
    lock(&s.settings).extend(body);
    Ok(Json(json!({ "msg": "settings updated" })).into_response())
}

// ── Inventory ───────────────────────────────────────────────────────

/// Rows of one collection, in insertion order. Rows stay raw JSON so tests
/// can seed spellings the client has to cope with.
#[derive(Default)]
struct Table {
    last_id: i64,
    rows: Vec<Map<String, Value>>,
}

impl Table {
    fn push(&mut self, mut row: Map<String, Value>) -> i64 {
        self.last_id += 1;
        row.insert("id".into(), json!(self.last_id));
        self.rows.push(row);
        self.last_id
    }

    fn position<T: Record>(&self, key: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| T::key_of(row).as_deref() == Some(key))
    }
}

/// Server-side rules for a collection.
trait Record: Resource {
    fn validate(&self) -> Result<(), Fail> {
        Ok(())
    }

    /// Field that must be unique across the collection, with its value.
    fn unique(&self) -> Option<(&'static str, String)> {
        None
    }

    fn key_of(row: &Map<String, Value>) -> Option<String> {
        serde_json::from_value::<Self>(Value::Object(row.clone()))
            .ok()
            .and_then(|record| record.key())
    }
}

impl Record for Lab {
    fn validate(&self) -> Result<(), Fail> {
        if self.name.trim().is_empty() {
            return Err(Fail::new(StatusCode::BAD_REQUEST, "lab name is required"));
        }
        Ok(())
    }

    fn unique(&self) -> Option<(&'static str, String)> {
        Some(("name", self.name.clone()))
    }
}

impl Record for Computer {}

impl Record for Accessory {}

impl Record for Report {}

impl Record for User {
    fn validate(&self) -> Result<(), Fail> {
        if self.email.trim().is_empty() {
            return Err(Fail::new(StatusCode::BAD_REQUEST, "user email is required"));
        }
        Ok(())
    }

    fn unique(&self) -> Option<(&'static str, String)> {
        Some(("email", self.email.clone()))
    }
}

/// Mount list/create on `T::PATH` and get/update/delete on `T::PATH/{key}`.
fn collection<T: Record>(router: Router<Arc<Shared>>) -> Router<Arc<Shared>> {
    router
        .route(T::PATH, get(list::<T>).post(create::<T>))
        .route(
            &format!("{}/{{key}}", T::PATH),
            get(fetch::<T>).put(update::<T>).delete(remove::<T>),
        )
}

fn not_found<T: Resource>() -> Fail {
    Fail::new(StatusCode::NOT_FOUND, format!("{} not found", T::NAME))
}

fn to_row<T: Serialize>(record: &T) -> Result<Map<String, Value>, Fail> {
    match serde_json::to_value(record) {
        Ok(Value::Object(row)) => Ok(row),
        _ => Err(Fail::new(StatusCode::INTERNAL_SERVER_ERROR, "record is not an object")),
    }
}

#[derive(Deserialize)]
struct DataOf<T> {
    data: T,
}

#[derive(Deserialize)]
struct ListQuery {
    kind: Option<String>,
}

async fn list<T: Record>(
    State(s): State<Arc<Shared>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Reply {
    s.authorize(&headers)?;
    let tables = lock(&s.tables);
    let rows: Vec<&Map<String, Value>> = tables
        .get(T::PATH)
        .map(|t| t.rows.iter().collect())
        .unwrap_or_default();
    let rows: Vec<_> = match &query.kind {
        Some(kind) => rows
            .into_iter()
            .filter(|row| row.get("kind").and_then(Value::as_str) == Some(kind.as_str()))
            .collect(),
        None => rows,
    };
    Ok(Json(json!({ "data": rows })).into_response())
}

async fn fetch<T: Record>(
    State(s): State<Arc<Shared>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Reply {
    s.authorize(&headers)?;
    let tables = lock(&s.tables);
    let table = tables.get(T::PATH).ok_or_else(not_found::<T>)?;
    let at = table.position::<T>(&key).ok_or_else(not_found::<T>)?;
    Ok(Json(json!({ "data": table.rows[at] })).into_response())
}

async fn create<T: Record>(
    State(s): State<Arc<Shared>>,
    headers: HeaderMap,
    Json(body): Json<DataOf<T>>,
) -> Reply {
    s.authorize(&headers)?;
    body.data.validate()?;
    let row = to_row(&body.data)?;

    let mut tables = lock(&s.tables);
    let table = tables.entry(T::PATH).or_default();
    if let Some((field, value)) = body.data.unique() {
        let taken = table.rows.iter().any(|existing| {
            serde_json::from_value::<T>(Value::Object(existing.clone()))
                .ok()
                .and_then(|r| r.unique())
                .is_some_and(|(_, v)| v == value)
        });
        if taken {
            return Err(Fail::new(
                StatusCode::CONFLICT,
                format!("{} {} already taken", T::NAME, field),
            ));
        }
    }
    table.push(row);
    let stored = table.rows.last().cloned().unwrap_or_default();
    let msg = format!("{} created", T::NAME);
    Ok((StatusCode::CREATED, Json(json!({ "data": stored, "msg": msg }))).into_response())
}

async fn update<T: Record>(
    State(s): State<Arc<Shared>>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(body): Json<DataOf<T>>,
) -> Reply {
    s.authorize(&headers)?;
    body.data.validate()?;
    let mut row = to_row(&body.data)?;

    let mut tables = lock(&s.tables);
    let table = tables.get_mut(T::PATH).ok_or_else(not_found::<T>)?;
    let at = table.position::<T>(&key).ok_or_else(not_found::<T>)?;
    if let Some(id) = table.rows[at].get("id") {
        row.insert("id".into(), id.clone());
    }
    table.rows[at] = row;
    Ok(Json(json!({ "data": table.rows[at] })).into_response())
}

async fn remove<T: Record>(
    State(s): State<Arc<Shared>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Reply {
    s.authorize(&headers)?;
    let mut tables = lock(&s.tables);
    let table = tables.get_mut(T::PATH).ok_or_else(not_found::<T>)?;
    let at = table.position::<T>(&key).ok_or_else(not_found::<T>)?;
    table.rows.remove(at);
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn part_statuses(State(s): State<Arc<Shared>>, headers: HeaderMap) -> Reply {
    s.authorize(&headers)?;
    let rows: Vec<Map<String, Value>> = lock(&s.statuses).values().cloned().collect();
    Ok(Json(json!({ "data": rows })).into_response())
}

async fn set_part_status(
    State(s): State<Arc<Shared>>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(body): Json<DataOf<PartStatusUpdate>>,
) -> Reply {
    s.authorize(&headers)?;
    let known = lock(&s.tables)
        .get(Computer::PATH)
        .and_then(|t| t.position::<Computer>(&key))
        .is_some();
    let id: i64 = key.parse().map_err(|_| not_found::<Computer>())?;
    if !known {
        return Err(not_found::<Computer>());
    }

    let status = serde_json::to_value(body.data.status)
        .map_err(|_| Fail::new(StatusCode::INTERNAL_SERVER_ERROR, "status encoding failed"))?;
    lock(&s.statuses)
        .entry(id)
        .or_insert_with(|| {
            let mut row = Map::new();
            row.insert("com_id".into(), json!(id));
            row
        })
        .insert(body.data.part.as_str().to_string(), status);
    Ok(Json(json!({ "msg": "status updated" })).into_response())
}
