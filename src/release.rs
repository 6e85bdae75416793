use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};

const USER_AGENT: &str = "node-brainer";
const SHORT_COMMIT_LEN: usize = 8;

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubTagRef {
    object: GitHubObject,
}

#[derive(Debug, Deserialize)]
struct GitHubObject {
    sha: String,
}

/// Where a client kind publishes its releases. Fixed per kind, templates validated up front.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub name: &'static str,
    pub releases_url: String,
    pub download_url: UrlTemplate,
    pub tag_commit_url: Option<UrlTemplate>,
}

impl ClientIdentity {
    pub fn new(name: &'static str, releases_url: &str, download_url: &str) -> Result<Self> {
        Ok(Self {
            name,
            releases_url: releases_url.to_string(),
            download_url: UrlTemplate::parse(download_url)?,
            tag_commit_url: None,
        })
    }

    pub fn with_tag_commit_url(mut self, template: &str) -> Result<Self> {
        self.tag_commit_url = Some(UrlTemplate::parse(template)?);
        Ok(self)
    }
}

/// A resolved release. `commit` is only set for clients whose assets are keyed on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    pub tag: String,
    pub commit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Tag,
    Version,
    Os,
    Arch,
    Commit,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "tag" => Some(Self::Tag),
            "version" => Some(Self::Version),
            "os" => Some(Self::Os),
            "arch" => Some(Self::Arch),
            "commit" => Some(Self::Commit),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Version => "version",
            Self::Os => "os",
            Self::Arch => "arch",
            Self::Commit => "commit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(Placeholder),
}

/// URL with `{tag}`, `{version}`, `{os}`, `{arch}` and `{commit}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    source: String,
    segments: Vec<Segment>,
}

/// Values substituted into a [`UrlTemplate`]. `version` is the tag without its leading `v`.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub tag: Option<String>,
    pub os: Option<String>,
    pub arch: Option<String>,
    pub commit: Option<String>,
}

impl TemplateVars {
    pub fn for_tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ..Default::default()
        }
    }

    pub fn with_platform(mut self, os: &str, arch: &str) -> Self {
        self.os = Some(os.to_string());
        self.arch = Some(arch.to_string());
        self
    }

    pub fn with_commit(mut self, commit: Option<&str>) -> Self {
        self.commit = commit.map(str::to_string);
        self
    }

    fn lookup(&self, placeholder: Placeholder) -> Option<String> {
        match placeholder {
            Placeholder::Tag => self.tag.clone(),
            Placeholder::Version => self.tag.as_deref().map(strip_v),
            Placeholder::Os => self.os.clone(),
            Placeholder::Arch => self.arch.clone(),
            Placeholder::Commit => self.commit.clone(),
        }
    }
}

/// `v1.13.5` -> `1.13.5`
pub fn strip_v(tag: &str) -> String {
    tag.strip_prefix('v').unwrap_or(tag).to_string()
}

impl UrlTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(Error::Template(format!("unclosed '{{' in {}", source)))
                            }
                            Some(c) => name.push(c),
                        }
                    }
                    let placeholder = Placeholder::parse(&name).ok_or_else(|| {
                        Error::Template(format!("unknown placeholder '{{{}}}' in {}", name, source))
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Var(placeholder));
                }
                '}' => {
                    return Err(Error::Template(format!("unmatched '}}' in {}", source)));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn render(&self, vars: &TemplateVars) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(placeholder) => {
                    let value = vars.lookup(*placeholder).ok_or_else(|| {
                        Error::Template(format!(
                            "no value for '{{{}}}' in {}",
                            placeholder.name(),
                            self.source
                        ))
                    })?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Network {
            url: String::new(),
            reason: format!("failed to create HTTP client: {}", e),
        })
}

/// Talks to a client's release index.
pub struct ArtifactFetcher {
    http: reqwest::Client,
}

impl ArtifactFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: http_client()?,
        })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn latest_tag(&self, identity: &ClientIdentity) -> Result<String> {
        let release: GitHubRelease = self.get_json(&identity.releases_url).await?;
        tracing::debug!(client = identity.name, tag = %release.tag_name, "Resolved latest release");
        Ok(release.tag_name)
    }

    /// Short commit hash the tag points at, for clients whose assets embed it.
    pub async fn resolve_commit(&self, identity: &ClientIdentity, tag: &str) -> Result<String> {
        let template = identity.tag_commit_url.as_ref().ok_or_else(|| {
            Error::Template(format!("{} has no tag commit endpoint", identity.name))
        })?;
        let url = template.render(&TemplateVars::for_tag(tag))?;

        let tag_ref: GitHubTagRef = self.get_json(&url).await?;
        let sha = tag_ref.object.sha;
        let short = sha.get(..SHORT_COMMIT_LEN).ok_or_else(|| Error::Decode {
            url: url.clone(),
            reason: format!("commit sha '{}' is shorter than {} characters", sha, SHORT_COMMIT_LEN),
        })?;

        tracing::debug!(client = identity.name, tag = %tag, commit = %short, "Resolved tag commit");
        Ok(short.to_string())
    }

    pub async fn resolve(&self, identity: &ClientIdentity) -> Result<ReleaseDescriptor> {
        let tag = self.latest_tag(identity).await?;
        let commit = match identity.tag_commit_url {
            Some(_) => Some(self.resolve_commit(identity, &tag).await?),
            None => None,
        };
        Ok(ReleaseDescriptor { tag, commit })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::trace!(url = %url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::Upstream {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| Error::Network {
            url: url.to_string(),
            reason: format!("failed to read response body: {}", e),
        })?;

        serde_json::from_slice(&body).map_err(|e| Error::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
