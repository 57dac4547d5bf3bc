//! The session client and the three-step upload/submission flow.

use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

use async_stream::stream;
use bytes::{Bytes, BytesMut};
use cookie_store::{CookieStore, RawCookie};
use futures_util::Stream;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest_cookie_store::CookieStoreMutex;
use tokio::io::AsyncReadExt;
use url::Url;

use crate::error::{Error, Result};
use crate::job::{JobOptions, JobPage};
use crate::scrape;

/// Production endpoint of the render farm.
pub const BASE_URL: &str = "https://www.sheepit-renderfarm.com";

/// Blender build the farm runs; the site expects this literal.
const EXECUTABLE: &str = "blender283";

/// Login, logout and the token request time out after this long. The archive
/// upload and job submission run unbounded, since archives can be large and
/// the site enforces its own limits.
const SHORT_TIMEOUT: Duration = Duration::from_secs(5);

const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Upload progress callback, called with `(bytes_sent, total_bytes)` after
/// every chunk.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync + 'static>;

/// One authenticated session against the farm.
///
/// All state lives in the cookie jar, which login/logout/import mutate.
/// Operations run one at a time; the client has no internal concurrency.
pub struct Client {
    http: reqwest::Client,
    cookies: Arc<CookieStoreMutex>,
    base_url: Url,
}

impl Client {
    pub fn new() -> Self {
        Self::with_base_url(Url::parse(BASE_URL).unwrap())
    }

    /// Same client against a different host. Tests point this at a local
    /// mock server.
    pub fn with_base_url(base_url: Url) -> Self {
        let cookies = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let http = reqwest::Client::builder()
            .user_agent(concat!("sheepit-client/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .unwrap();
        Self {
            http,
            cookies,
            base_url,
        }
    }

    fn endpoint(&self, path_and_query: &str) -> Url {
        self.base_url.join(path_and_query).unwrap()
    }

    /// Authenticates the session. The server answers the literal body `OK`
    /// on success; anything else means the credentials were rejected.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        debug!("logging in as {username}");
        let res = self
            .http
            .post(self.endpoint("/ajax.php"))
            .form(&[
                ("login", username),
                ("password", password),
                ("do_login", "do_login"),
                ("timezone", "Europe/Berlin"),
                ("account_login", "account_login"),
            ])
            .timeout(SHORT_TIMEOUT)
            .send()
            .await?;
        let body = res.text().await?;
        if body != "OK" {
            return Err(Error::Login("wrong username and/or password".to_string()));
        }
        Ok(())
    }

    /// Tells the server to end the session, then drops the local cookies.
    /// The cookies are dropped even when the request fails; the transport
    /// error is still reported.
    pub async fn logout(&self) -> Result<()> {
        let res = self
            .http
            .get(self.endpoint("/account.php?mode=logout"))
            .timeout(SHORT_TIMEOUT)
            .send()
            .await;
        self.cookies.lock().unwrap().clear();
        res?;
        Ok(())
    }

    /// Rehydrates the session from a stored cookie map. Every entry is
    /// scoped to the farm's host.
    pub fn import_session(&self, cookies: &HashMap<String, String>) {
        let mut store = self.cookies.lock().unwrap();
        for (name, value) in cookies {
            let cookie = RawCookie::new(name.clone(), value.clone());
            let _ = store.insert_raw(&cookie, &self.base_url);
        }
    }

    /// The farm-scoped cookies as a plain map, for the caller to persist
    /// however it likes. `import_session(&export_session())` is a no-op.
    pub fn export_session(&self) -> HashMap<String, String> {
        let store = self.cookies.lock().unwrap();
        store
            .matches(&self.base_url)
            .into_iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect()
    }

    /// Step 1: asks the get-started page for a fresh upload token. The
    /// token pairs with exactly one [`upload_file`](Self::upload_file) +
    /// [`add_job`](Self::add_job).
    pub async fn request_upload_token(&self) -> Result<String> {
        let res = self
            .http
            .get(self.endpoint("/getstarted.php"))
            .timeout(SHORT_TIMEOUT)
            .send()
            .await?;
        let token = scrape::scrape_token(&res.text().await?);
        if token.is_empty() {
            return Err(Error::Upload(
                "no upload token on the get-started page; \
                 the simultaneous-project limit may be reached"
                    .to_string(),
            ));
        }
        debug!("received upload token {token}");
        Ok(token)
    }

    /// Step 2: uploads the archive as multipart form data under the token.
    /// The server gives no acceptance signal beyond completing the request.
    pub async fn upload_file(
        &self,
        token: &str,
        archive: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        let name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Upload(format!("bad archive path: {}", archive.display())))?
            .to_string();
        let file = tokio::fs::File::open(archive).await?;
        let size = file.metadata().await?.len();
        debug!("uploading {name} ({size} bytes)");

        let body = reqwest::Body::wrap_stream(chunked(file, size, progress));
        let form = Form::new()
            .text("step", "1")
            .text("transfertmethod", "File")
            .text("token", token.to_string())
            .text("PHP_SESSION_UPLOAD_PROGRESS", token.to_string())
            .text("mode", "add")
            .part(
                "addjob_archive",
                Part::stream_with_length(body, size).file_name(name),
            );
        self.http
            .post(self.endpoint("/jobs.php"))
            .multipart(form)
            .send()
            .await?;
        Ok(())
    }

    /// Step 3: reads the step-2 configuration page for the token and posts
    /// the assembled job settings. Server-echoed fields go out verbatim;
    /// caller-chosen ones come from `options`. Returns the echoed fields so
    /// the caller can report what was submitted.
    pub async fn add_job(&self, token: &str, options: &JobOptions) -> Result<JobPage> {
        let res = self
            .http
            .get(self.endpoint(&format!("/jobs.php?mode=add&step=2&token={token}")))
            .send()
            .await?;
        let page = scrape::scrape_job_page(&res.text().await?);
        debug!("step-2 page echoed engine {:?}", page.engine);

        let compute = options.compute.for_engine(&page.engine);
        let (start, end, step) = options.kind.frame_range();
        let settings = [
            ("addjob", "addjob".to_string()),
            ("do_addjob", "do_addjob".to_string()),
            ("token", token.to_string()),
            ("type", options.kind.type_field().to_string()),
            ("compute_method", compute.bitmask().to_string()),
            ("executable", EXECUTABLE.to_string()),
            ("engine", page.engine.clone()),
            ("public_render", flag(options.public)),
            ("public_thumbnail", "0".to_string()),
            ("generate_mp4", flag(options.mp4)),
            ("start_frame", start.to_string()),
            ("end_frame", end.to_string()),
            ("step_frame", step.to_string()),
            ("archive", page.archive.clone()),
            ("max_ram_optional", String::new()),
            ("path", page.path.clone()),
            ("framerate", page.framerate.clone()),
            ("split_tiles", options.split_tiles.clone()),
            ("exr", "0".to_string()),
            ("cycles_samples", page.cycles_samples.clone()),
            ("samples_pixel", page.samples_pixel.clone()),
            ("image_extension", page.image_extension.clone()),
        ];

        // The ajax endpoint answers with a page fragment, not a status we
        // could check; completing the POST is as much confirmation as the
        // site gives.
        self.http
            .post(self.endpoint("/ajax.php"))
            .form(&settings)
            .send()
            .await?;
        Ok(page)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

fn flag(b: bool) -> String {
    (if b { "1" } else { "0" }).to_string()
}

/// Reads the file in chunks, reporting progress after each one.
fn chunked(
    mut file: tokio::fs::File,
    total: u64,
    progress: Option<ProgressFn>,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    stream! {
        let mut sent = 0u64;
        loop {
            let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
            match file.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    sent += n as u64;
                    if let Some(report) = progress.as_ref() {
                        report(sent, total);
                    }
                    yield Ok(buf.freeze());
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}
