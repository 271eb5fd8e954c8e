//! A [`Backend`] backed by a real CalDAV server
//!
//! Calendar discovery follows the usual CalDAV bootstrap sequence: PROPFIND for the current
//! user's principal, PROPFIND for its calendar-home-set, then PROPFIND (depth 1) on the home set
//! to enumerate calendar collections. Events are fetched with a REPORT calendar-query; mutations
//! are plain PUT/DELETE against the event's own URL.

use async_trait::async_trait;
use minidom::Element;
use reqwest::header::{CONTENT_TYPE, IF_NONE_MATCH};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::backend::{Backend, CalendarHandle};
use crate::error::{Result, SyncError};
use crate::event::EventView;
use crate::ical::extract_metadata;
use crate::utils::{find_elem, find_elems};

static DAVCLIENT_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:">
       <d:prop>
           <d:current-user-principal />
       </d:prop>
    </d:propfind>
"#;

static HOMESET_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" >
      <d:self/>
      <d:prop>
        <c:calendar-home-set />
      </d:prop>
    </d:propfind>
"#;

static CAL_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" >
       <d:prop>
         <d:displayname />
         <d:resourcetype />
       </d:prop>
    </d:propfind>
"#;

static EVENTS_BODY: &str = r#"
    <C:calendar-query xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop xmlns:D="DAV:">
        <D:getetag/>
        <C:calendar-data/>
    </D:prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
        <C:comp-filter name="VEVENT"/>
        </C:comp-filter>
    </C:filter>
    </C:calendar-query>
"#;

/// A CalDAV-backed [`Backend`]
pub struct CaldavBackend {
    account: String,
    url: Url,
    username: String,
    password: String,
    http: reqwest::Client,
}

impl CaldavBackend {
    pub fn new<S: AsRef<str>>(account: String, url: S, username: String, password: String) -> Result<Self> {
        let url = Url::parse(url.as_ref()).map_err(|err| SyncError::Config(format!("invalid CalDAV url: {}", err)))?;
        Ok(Self {
            account,
            url,
            username,
            password,
            http: reqwest::Client::new(),
        })
    }

    fn backend_error(&self, calendar: &str, err: impl std::error::Error + Send + Sync + 'static) -> SyncError {
        SyncError::Backend {
            account: self.account.clone(),
            calendar: calendar.to_string(),
            source: Box::new(err),
        }
    }

    async fn request(&self, method: &[u8], url: &Url, body: impl Into<String>, depth: Option<u32>) -> Result<reqwest::Response> {
        let method = Method::from_bytes(method).expect("valid HTTP method");
        let mut req = self
            .http
            .request(method, url.as_str())
            .header(CONTENT_TYPE, "application/xml")
            .basic_auth(&self.username, Some(&self.password))
            .body(body.into());
        if let Some(depth) = depth {
            req = req.header("Depth", depth);
        }
        req.send()
            .await
            .map_err(|err| self.backend_error(url.as_str(), err))
    }

    async fn propfind_text(&self, url: &Url, body: &str, depth: u32, path: &[&str]) -> Result<String> {
        let res = self.request(b"PROPFIND", url, body, Some(depth)).await?;
        let text = res.text().await.map_err(|err| self.backend_error(url.as_str(), err))?;
        let root: Element = text
            .parse()
            .map_err(|err: minidom::Error| SyncError::Codec(format!("malformed WebDAV response: {}", err)))?;

        let mut current = &root;
        for segment in path {
            current = find_elem(current, *segment)
                .ok_or_else(|| SyncError::Codec(format!("WebDAV response missing <{}>", segment)))?;
        }
        Ok(current.text())
    }

    async fn get_principal(&self) -> Result<Url> {
        let href = self.propfind_text(&self.url, DAVCLIENT_BODY, 0, &["current-user-principal", "href"]).await?;
        let mut principal = self.url.clone();
        principal.set_path(&href);
        log::debug!("[{}] principal url is {}", self.account, href);
        Ok(principal)
    }

    async fn get_calendar_home_set(&self) -> Result<Url> {
        let principal = self.get_principal().await?;
        let href = self.propfind_text(&principal, HOMESET_BODY, 0, &["calendar-home-set", "href"]).await?;
        let mut home_set = self.url.clone();
        home_set.set_path(&href);
        log::debug!("[{}] calendar-home-set url is {}", self.account, home_set.path());
        Ok(home_set)
    }
}

#[async_trait]
impl Backend for CaldavBackend {
    async fn list_calendars_inner(&self) -> Result<Vec<(String, CalendarHandle)>> {
        let home_set = self.get_calendar_home_set().await?;
        let res = self.request(b"PROPFIND", &home_set, CAL_BODY, Some(1)).await?;
        let text = res.text().await.map_err(|err| self.backend_error(home_set.as_str(), err))?;
        let root: Element = text
            .parse()
            .map_err(|err: minidom::Error| SyncError::Codec(format!("malformed WebDAV response: {}", err)))?;

        let mut calendars = Vec::new();
        for response in find_elems(&root, "response") {
            let display_name = find_elem(response, "displayname").map(|e| e.text()).unwrap_or_default();

            let is_calendar = find_elem(response, "resourcetype")
                .map(|rt| rt.children().any(|c| c.name() == "calendar"))
                .unwrap_or(false);
            if !is_calendar {
                continue;
            }

            let href = match find_elem(response, "href") {
                Some(h) => h.text(),
                None => {
                    log::warn!("[{}] calendar '{}' has no href, ignoring it", self.account, display_name);
                    continue;
                }
            };
            let mut calendar_url = self.url.clone();
            calendar_url.set_path(&href);
            log::info!("[{}] found calendar '{}'", self.account, display_name);
            calendars.push((display_name, calendar_url.to_string()));
        }
        Ok(calendars)
    }

    async fn fetch_events_inner(&self, calendar: &CalendarHandle) -> Result<Vec<EventView>> {
        let url = Url::parse(calendar).map_err(|err| self.backend_error(calendar, err))?;
        let res = self.request(b"REPORT", &url, EVENTS_BODY, Some(1)).await?;
        let text = res.text().await.map_err(|err| self.backend_error(calendar, err))?;
        let root: Element = text
            .parse()
            .map_err(|err: minidom::Error| SyncError::Codec(format!("malformed WebDAV response: {}", err)))?;

        let mut events = Vec::new();
        for response in find_elems(&root, "response") {
            let href = match find_elem(response, "href") {
                Some(h) => h.text(),
                None => continue,
            };
            let raw = match find_elem(response, "calendar-data") {
                Some(d) => d.text(),
                None => continue,
            };
            let mut handle_url = self.url.clone();
            handle_url.set_path(&href);

            match extract_metadata(&raw) {
                Ok(meta) => events.push(EventView {
                    uid: meta.uid,
                    last_modified: meta.last_modified,
                    summary: meta.summary,
                    dtstart: meta.dtstart,
                    dtend: meta.dtend,
                    handle: handle_url.to_string(),
                    raw,
                }),
                Err(err) => log::warn!("[{}] skipping undecodable event at {}: {}", self.account, href, err),
            }
        }
        Ok(events)
    }

    async fn create_event_inner(&self, calendar: &CalendarHandle, raw: &str) -> Result<()> {
        let meta = extract_metadata(raw)?;
        let mut event_url = Url::parse(calendar).map_err(|err| self.backend_error(calendar, err))?;
        let mut path = event_url.path().trim_end_matches('/').to_string();
        path.push('/');
        path.push_str(&format!("{}.ics", sanitize_uid(&meta.uid)));
        event_url.set_path(&path);

        let res = self
            .http
            .request(Method::PUT, event_url.as_str())
            .header(CONTENT_TYPE, "text/calendar; charset=utf-8")
            .header(IF_NONE_MATCH, "*")
            .basic_auth(&self.username, Some(&self.password))
            .body(raw.to_string())
            .send()
            .await
            .map_err(|err| self.backend_error(calendar, err))?;

        match res.status() {
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => Err(SyncError::DuplicateUid(meta.uid)),
            status if status.is_success() => Ok(()),
            status => Err(self.backend_error(calendar, HttpStatusError(status))),
        }
    }

    async fn update_event_inner(&self, calendar: &CalendarHandle, event_handle: &str, raw: &str) -> Result<()> {
        let res = self
            .http
            .request(Method::PUT, event_handle)
            .header(CONTENT_TYPE, "text/calendar; charset=utf-8")
            .basic_auth(&self.username, Some(&self.password))
            .body(raw.to_string())
            .send()
            .await
            .map_err(|err| self.backend_error(calendar, err))?;

        if res.status().is_success() {
            Ok(())
        } else {
            Err(self.backend_error(calendar, HttpStatusError(res.status())))
        }
    }

    async fn delete_event_inner(&self, calendar: &CalendarHandle, event_handle: &str) -> Result<()> {
        let res = self
            .http
            .request(Method::DELETE, event_handle)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|err| self.backend_error(calendar, err))?;

        if res.status().is_success() || res.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.backend_error(calendar, HttpStatusError(res.status())))
        }
    }

    fn account_name(&self) -> &str {
        &self.account
    }
}

fn sanitize_uid(uid: &str) -> String {
    uid.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[derive(Debug)]
struct HttpStatusError(StatusCode);

impl std::fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unexpected HTTP status {}", self.0)
    }
}

impl std::error::Error for HttpStatusError {}
