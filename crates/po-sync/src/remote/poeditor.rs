//! Blocking client for the POEditor v2 API.

use std::{
    cell::Cell,
    collections::BTreeMap,
    io::Write,
    path::Path,
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use reqwest::blocking::{Client, Response, multipart::Form};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use time::{
    OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};
use tracing::debug;
use url::Url;

use super::{
    ExportedCatalog, FileType, Project, ProjectId, ProjectLanguage, RemoteError,
    TranslationService, UploadSummary,
};
use crate::{config::ApiToken, error::CoreError};

pub const DEFAULT_BASE_URL: &str = "https://api.poeditor.com/v2/";
/// The service accepts one upload per project every 20 seconds.
const DEFAULT_UPLOAD_INTERVAL: Duration = Duration::from_secs(20);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Minimum spacing between two uploads.
    pub upload_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            upload_interval: DEFAULT_UPLOAD_INTERVAL,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_upload_interval(mut self, upload_interval: Duration) -> Self {
        self.upload_interval = upload_interval;
        self
    }
}

pub struct PoEditorClient {
    http: Client,
    base_url: Url,
    token: ApiToken,
    upload_interval: Duration,
    last_upload: Cell<Option<Instant>>,
}

impl std::fmt::Debug for PoEditorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoEditorClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token)
            .finish()
    }
}

impl PoEditorClient {
    pub fn new(token: ApiToken, config: ClientConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("po-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token,
            upload_interval: config.upload_interval,
            last_upload: Cell::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(endpoint)
            .map_err(|source| RemoteError::Url { endpoint: endpoint.to_string(), source })
    }

    fn post_form(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Response, RemoteError> {
        let url = self.endpoint_url(endpoint)?;
        let mut form: Vec<(&str, &str)> = vec![("api_token", self.token.expose())];
        form.extend(params.iter().map(|(key, value)| (*key, value.as_str())));
        debug!(endpoint, "POST");
        self.http
            .post(url)
            .form(&form)
            .send()
            .map_err(|source| RemoteError::Transport { endpoint: endpoint.to_string(), source })
    }

    fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let response = self.post_form(endpoint, params)?;
        decode_envelope::<T>(endpoint, response)?
            .ok_or_else(|| RemoteError::MissingResult { endpoint: endpoint.to_string() })
    }

    fn call_unit(&self, endpoint: &str, params: &[(&str, String)]) -> Result<(), RemoteError> {
        let response = self.post_form(endpoint, params)?;
        decode_envelope::<Value>(endpoint, response)?;
        Ok(())
    }

    fn download(&self, url: &str) -> Result<ExportedCatalog, RemoteError> {
        const ENDPOINT: &str = "export download";
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|source| RemoteError::Transport { endpoint: ENDPOINT.into(), source })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_else(|e| format!("<failed to read body: {e}>"));
            return Err(RemoteError::Status {
                endpoint: ENDPOINT.into(),
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response
            .bytes()
            .map_err(|source| RemoteError::Transport { endpoint: ENDPOINT.into(), source })?;

        let io_error = |context: &str, source| RemoteError::Io { context: context.into(), source };
        let mut file = tempfile::Builder::new()
            .prefix("po-sync-")
            .suffix(".po")
            .tempfile()
            .map_err(|source| io_error("failed to create temporary catalog", source))?;
        file.write_all(&bytes)
            .map_err(|source| io_error("failed to write temporary catalog", source))?;
        let (_, path) =
            file.keep().map_err(|err| io_error("failed to keep temporary catalog", err.error))?;
        debug!(path = %path.display(), bytes = bytes.len(), "catalog downloaded");
        Ok(ExportedCatalog { url: url.to_string(), path })
    }

    fn wait_for_upload_slot(&self) {
        if let Some(last) = self.last_upload.get() {
            let elapsed = last.elapsed();
            if elapsed < self.upload_interval {
                let remaining = self.upload_interval - elapsed;
                debug!(wait_ms = remaining.as_millis() as u64, "pacing upload");
                thread::sleep(remaining);
            }
        }
    }
}

impl TranslationService for PoEditorClient {
    fn list_projects(&self) -> Result<Vec<Project>, RemoteError> {
        let result: ProjectsResult = self.call("projects/list", &[])?;
        Ok(result
            .projects
            .into_iter()
            .map(|project| Project { id: ProjectId::new(project.id), name: project.name })
            .collect())
    }

    fn list_project_languages(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ProjectLanguage>, RemoteError> {
        let result: LanguagesResult =
            self.call("languages/list", &[("id", project_id.to_string())])?;
        Ok(result
            .languages
            .into_iter()
            .map(|language| ProjectLanguage {
                updated: language.updated.as_deref().and_then(parse_timestamp),
                code: language.code,
                name: language.name,
                percentage: language.percentage,
            })
            .collect())
    }

    fn available_languages(&self) -> Result<BTreeMap<String, String>, RemoteError> {
        let result: AvailableResult = self.call("languages/available", &[])?;
        Ok(result.languages.into_iter().map(|language| (language.name, language.code)).collect())
    }

    fn export(
        &self,
        project_id: ProjectId,
        language_code: &str,
        file_type: FileType,
    ) -> Result<ExportedCatalog, RemoteError> {
        let result: ExportResult = self.call(
            "projects/export",
            &[
                ("id", project_id.to_string()),
                ("language", language_code.to_string()),
                ("type", file_type.as_str().to_string()),
            ],
        )?;
        self.download(&result.url)
    }

    fn update_terms_definitions(
        &self,
        project_id: ProjectId,
        language_code: &str,
        file_path: &Path,
        overwrite: bool,
        sync_terms: bool,
    ) -> Result<UploadSummary, RemoteError> {
        const ENDPOINT: &str = "projects/upload";
        self.wait_for_upload_slot();

        let form = Form::new()
            .text("api_token", self.token.expose().to_string())
            .text("id", project_id.to_string())
            .text("updating", "terms_translations")
            .text("language", language_code.to_string())
            .text("overwrite", flag(overwrite))
            .text("sync_terms", flag(sync_terms))
            .file("file", file_path)
            .map_err(|source| RemoteError::Io {
                context: format!("failed to read catalog {}", file_path.display()),
                source,
            })?;

        let url = self.endpoint_url(ENDPOINT)?;
        debug!(endpoint = ENDPOINT, language = language_code, "POST multipart");
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .map_err(|source| RemoteError::Transport { endpoint: ENDPOINT.into(), source });
        self.last_upload.set(Some(Instant::now()));

        let result: UploadResult = decode_envelope(ENDPOINT, response?)?
            .ok_or_else(|| RemoteError::MissingResult { endpoint: ENDPOINT.into() })?;
        Ok(UploadSummary {
            terms_parsed: result.terms.parsed,
            terms_added: result.terms.added,
            terms_deleted: result.terms.deleted,
            translations_parsed: result.translations.parsed,
            translations_added: result.translations.added,
            translations_updated: result.translations.updated,
        })
    }

    fn add_language_to_project(
        &self,
        project_id: ProjectId,
        language_code: &str,
    ) -> Result<(), RemoteError> {
        self.call_unit(
            "languages/add",
            &[("id", project_id.to_string()), ("language", language_code.to_string())],
        )
    }

    fn delete_language_from_project(
        &self,
        project_id: ProjectId,
        language_code: &str,
    ) -> Result<(), RemoteError> {
        self.call_unit(
            "languages/delete",
            &[("id", project_id.to_string()), ("language", language_code.to_string())],
        )
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let normalized =
        if trimmed.ends_with('/') { trimmed.to_string() } else { format!("{trimmed}/") };
    Url::parse(&normalized)
        .map_err(|source| CoreError::InvalidApiUrl { url: trimmed.to_string(), source }.into())
}

/// Parse the service's timestamps (`2015-05-04T14:21:41+0000`); empty means absent.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let compact = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
    );
    OffsetDateTime::parse(raw, compact).or_else(|_| OffsetDateTime::parse(raw, &Rfc3339)).ok()
}

fn decode_envelope<T: DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> Result<Option<T>, RemoteError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|source| RemoteError::Transport { endpoint: endpoint.to_string(), source })?;
    if !status.is_success() {
        return Err(RemoteError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(&body)
        .map_err(|source| RemoteError::Decode { endpoint: endpoint.to_string(), source })?;
    if envelope.response.status != STATUS_SUCCESS {
        return Err(RemoteError::Rejected {
            endpoint: endpoint.to_string(),
            code: value_to_string(&envelope.response.code),
            message: envelope.response.message,
        });
    }
    Ok(envelope.result)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: ResponseStatus,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ResponseStatus {
    status: String,
    #[serde(default)]
    code: Value,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProjectsResult {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct LanguagesResult {
    #[serde(default)]
    languages: Vec<LanguageEntry>,
}

#[derive(Debug, Deserialize)]
struct LanguageEntry {
    code: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    percentage: Option<f64>,
    #[serde(default)]
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvailableResult {
    #[serde(default)]
    languages: Vec<AvailableEntry>,
}

#[derive(Debug, Deserialize)]
struct AvailableEntry {
    name: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct ExportResult {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct UploadResult {
    #[serde(default)]
    terms: UploadCounters,
    #[serde(default)]
    translations: UploadCounters,
}

#[derive(Debug, Default, Deserialize)]
struct UploadCounters {
    #[serde(default)]
    parsed: u64,
    #[serde(default)]
    added: u64,
    #[serde(default)]
    deleted: u64,
    #[serde(default)]
    updated: u64,
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use time::macros::datetime;
    use tokio::runtime::Runtime;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    use super::*;

    fn test_runtime() -> Runtime {
        Runtime::new().expect("create tokio runtime")
    }

    fn success(result: Value) -> Value {
        json!({
            "response": {"status": "success", "code": "200", "message": "OK"},
            "result": result,
        })
    }

    fn client_for(server: &MockServer) -> PoEditorClient {
        let token = ApiToken::new("test-token").unwrap();
        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_upload_interval(Duration::ZERO);
        PoEditorClient::new(token, config).unwrap()
    }

    #[test]
    fn parses_service_timestamps() {
        assert_eq!(
            parse_timestamp("2015-05-04T14:21:41+0000"),
            Some(datetime!(2015-05-04 14:21:41 UTC))
        );
        assert_eq!(
            parse_timestamp("2020-01-02T03:04:05+02:00"),
            Some(datetime!(2020-01-02 03:04:05 +2))
        );
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = parse_base_url("http://localhost:9000/v2").unwrap();
        assert_eq!(
            url.join("projects/list").unwrap().as_str(),
            "http://localhost:9000/v2/projects/list"
        );
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn lists_projects_with_token() {
        let rt = test_runtime();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/projects/list"))
                .and(body_string_contains("api_token=test-token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(success(json!({
                    "projects": [
                        {"id": 7717, "name": "SubDownloader", "public": 0, "open": 0},
                        {"id": 42, "name": "Other", "public": 1, "open": 1}
                    ]
                }))))
                .mount(&server),
        );

        let projects = client_for(&server).list_projects().unwrap();
        assert_eq!(
            projects,
            vec![
                Project { id: ProjectId::new(7717), name: "SubDownloader".into() },
                Project { id: ProjectId::new(42), name: "Other".into() },
            ]
        );
    }

    #[test]
    fn lists_project_languages_with_optional_metadata() {
        let rt = test_runtime();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/languages/list"))
                .and(body_string_contains("id=7717"))
                .respond_with(ResponseTemplate::new(200).set_body_json(success(json!({
                    "languages": [
                        {"name": "English", "code": "en", "translations": 13, "percentage": 100, "updated": "2015-05-04T14:21:41+0000"},
                        {"name": "Portuguese (BR)", "code": "pt-br", "translations": 0, "percentage": 12.5, "updated": ""}
                    ]
                }))))
                .mount(&server),
        );

        let languages = client_for(&server).list_project_languages(ProjectId::new(7717)).unwrap();
        assert_eq!(languages.len(), 2);
        assert_eq!(languages[0].percentage, Some(100.0));
        assert_eq!(languages[0].updated, Some(datetime!(2015-05-04 14:21:41 UTC)));
        assert_eq!(languages[1].code, "pt-br");
        assert_eq!(languages[1].updated, None);
    }

    #[test]
    fn service_failure_maps_to_rejection() {
        let rt = test_runtime();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/languages/add"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "response": {"status": "fail", "code": "4101", "message": "Invalid language code"}
                })))
                .mount(&server),
        );

        let err = client_for(&server)
            .add_language_to_project(ProjectId::new(1), "xx-yy")
            .unwrap_err();
        assert!(err.is_rejection(), "unexpected error: {err:?}");
        match err {
            RemoteError::Rejected { code, message, .. } => {
                assert_eq!(code, "4101");
                assert_eq!(message, "Invalid language code");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn http_errors_are_not_rejections() {
        let rt = test_runtime();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/languages/delete"))
                .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
                .mount(&server),
        );

        let err = client_for(&server)
            .delete_language_from_project(ProjectId::new(1), "fr")
            .unwrap_err();
        assert!(!err.is_rejection());
        assert!(matches!(err, RemoteError::Status { status: 503, .. }));
    }

    #[test]
    fn export_downloads_catalog_into_temporary_file() {
        let rt = test_runtime();
        let server = rt.block_on(MockServer::start());
        let download_url = format!("{}/download/fr.po", server.uri());
        rt.block_on(async {
            Mock::given(method("POST"))
                .and(path("/projects/export"))
                .and(body_string_contains("language=fr"))
                .and(body_string_contains("type=po"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(success(json!({"url": download_url.clone()}))),
                )
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/download/fr.po"))
                .respond_with(ResponseTemplate::new(200).set_body_string("msgid \"a\"\nmsgstr \"b\"\n"))
                .mount(&server)
                .await;
        });

        let exported = client_for(&server).export(ProjectId::new(1), "fr", FileType::Po).unwrap();
        assert_eq!(exported.url, download_url);
        assert_eq!(exported.path.extension().and_then(|s| s.to_str()), Some("po"));
        assert_eq!(fs::read_to_string(&exported.path).unwrap(), "msgid \"a\"\nmsgstr \"b\"\n");
        fs::remove_file(&exported.path).unwrap();
    }

    #[test]
    fn upload_sends_multipart_and_reads_counters() {
        let rt = test_runtime();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("POST"))
                .and(path("/projects/upload"))
                .and(body_string_contains("terms_translations"))
                .and(body_string_contains("msgid \"hello\""))
                .respond_with(ResponseTemplate::new(200).set_body_json(success(json!({
                    "terms": {"parsed": 2, "added": 1, "deleted": 0},
                    "translations": {"parsed": 2, "added": 2, "updated": 0}
                }))))
                .expect(1)
                .mount(&server),
        );

        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("app.po");
        fs::write(&catalog, "msgid \"hello\"\nmsgstr \"bonjour\"\n").unwrap();

        let summary = client_for(&server)
            .update_terms_definitions(ProjectId::new(1), "fr", &catalog, true, true)
            .unwrap();
        assert_eq!(summary.terms_added, 1);
        assert_eq!(summary.translations_added, 2);
        rt.block_on(server.verify());
    }
}
