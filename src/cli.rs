use std::{collections::BTreeMap, env, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use objectgcs::{
    adapters::{auth::AuthorizedTransport, Transport},
    config::BucketConfig,
    util::uri::{parse_object_uri, ObjectUri},
    new_bucket, Bucket, CreateObjectRequest, FieldUpdate, Query, ReadObjectRequest,
    StatObjectRequest, UpdateObjectRequest,
};

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and modify objects in Google Cloud Storage")]
pub struct Args {
    /// Project id (overrides OBJECTGCS_PROJECT)
    #[arg(long)]
    pub project: Option<String>,

    /// OAuth2 access token (overrides OBJECTGCS_ACCESS_TOKEN)
    #[arg(long)]
    pub access_token: Option<String>,

    /// Host serving object contents (overrides OBJECTGCS_STORAGE_HOST)
    #[arg(long)]
    pub storage_host: Option<String>,

    /// Host accepting uploads (overrides OBJECTGCS_UPLOAD_HOST)
    #[arg(long)]
    pub upload_host: Option<String>,

    /// JSON API base URL (overrides OBJECTGCS_API_BASE)
    #[arg(long)]
    pub api_base: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print an object's metadata as JSON
    Stat { uri: String },

    /// Write an object's contents to stdout
    Cat {
        uri: String,
        #[arg(long)]
        generation: Option<i64>,
    },

    /// Upload a file, or stdin when given `-`
    Put {
        source: String,
        uri: String,
        #[arg(long)]
        content_type: Option<String>,
        #[arg(long)]
        if_generation_match: Option<i64>,
    },

    /// Change an object's metadata. An empty value clears the field.
    Set {
        uri: String,
        #[arg(long)]
        content_type: Option<String>,
        #[arg(long)]
        content_encoding: Option<String>,
        #[arg(long)]
        content_language: Option<String>,
        #[arg(long)]
        cache_control: Option<String>,
        /// `key=value` to set, `key=` to remove
        #[arg(long)]
        metadata: Vec<String>,
    },

    /// Delete an object
    Rm { uri: String },

    /// List one page of objects under `gs://bucket/prefix`
    Ls {
        uri: String,
        #[arg(long)]
        delimiter: Option<String>,
        #[arg(long)]
        max_results: Option<u32>,
        #[arg(long)]
        page_token: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub project_id: String,
    pub access_token: Option<String>,
    pub storage_host: Option<String>,
    pub upload_host: Option<String>,
    pub api_base: Option<String>,
}

impl CliConfig {
    pub fn from_env_and_args(args: &Args) -> Self {
        Self::merge(args, |key| env::var(key).ok())
    }

    fn merge(args: &Args, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |arg: &Option<String>, key: &str| {
            arg.clone().or_else(|| lookup(key)).filter(|v| !v.is_empty())
        };

        Self {
            project_id: pick(&args.project, "OBJECTGCS_PROJECT").unwrap_or_default(),
            access_token: pick(&args.access_token, "OBJECTGCS_ACCESS_TOKEN"),
            storage_host: pick(&args.storage_host, "OBJECTGCS_STORAGE_HOST"),
            upload_host: pick(&args.upload_host, "OBJECTGCS_UPLOAD_HOST"),
            api_base: pick(&args.api_base, "OBJECTGCS_API_BASE"),
        }
    }

    pub fn bucket_config(&self, bucket: &str) -> BucketConfig {
        let mut config = BucketConfig::new(&self.project_id, bucket);
        if let Some(host) = &self.storage_host {
            config = config.with_storage_host(host);
        }
        if let Some(host) = &self.upload_host {
            config = config.with_upload_host(host);
        }
        if let Some(base) = &self.api_base {
            config = config.with_api_base(base);
        }
        config
    }

    pub fn open_bucket(&self, bucket: &str) -> Result<Arc<dyn Bucket>> {
        let client = reqwest::Client::builder()
            .build()
            .context("building http client")?;

        let transport: Arc<dyn Transport> = match &self.access_token {
            Some(token) => Arc::new(
                AuthorizedTransport::new(client, token).context("invalid access token")?,
            ),
            None => Arc::new(client),
        };

        Ok(new_bucket(self.bucket_config(bucket), transport))
    }
}

/// Parse repeated `key=value` flags into a metadata delta.
pub fn parse_metadata_args(args: &[String]) -> Result<Option<BTreeMap<String, Option<String>>>> {
    if args.is_empty() {
        return Ok(None);
    }

    let mut delta = BTreeMap::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("metadata must be key=value, got: {}", arg);
        };
        if key.is_empty() {
            bail!("metadata key is empty in: {}", arg);
        }
        let value = (!value.is_empty()).then(|| value.to_string());
        delta.insert(key.to_string(), value);
    }

    Ok(Some(delta))
}

fn object_uri(uri: &str) -> Result<ObjectUri> {
    let parsed = parse_object_uri(uri)?;
    if parsed.object.is_empty() {
        bail!("no object name in: {}", uri);
    }
    Ok(parsed)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(args: Args) -> Result<()> {
    let config = CliConfig::from_env_and_args(&args);
    debug!(project=%config.project_id, "config");

    match args.command {
        Command::Stat { uri } => {
            let target = object_uri(&uri)?;
            let bucket = config.open_bucket(&target.bucket)?;
            let o = bucket
                .stat_object(&StatObjectRequest::new(target.object))
                .await?;
            print_json(&o)?;
        }
        Command::Cat { uri, generation } => {
            let target = object_uri(&uri)?;
            let bucket = config.open_bucket(&target.bucket)?;
            let req = ReadObjectRequest {
                name: target.object,
                generation: generation.unwrap_or(0),
            };

            let mut reader = bucket.new_reader(&req).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout)
                .await
                .context("copying contents to stdout")?;
            stdout.flush().await?;
        }
        Command::Put {
            source,
            uri,
            content_type,
            if_generation_match,
        } => {
            let target = object_uri(&uri)?;
            let bucket = config.open_bucket(&target.bucket)?;

            let contents = if source == "-" {
                ReaderStream::new(BufReader::new(tokio::io::stdin())).boxed()
            } else {
                let path = PathBuf::from(&source);
                let file = tokio::fs::File::open(&path)
                    .await
                    .with_context(|| format!("opening {}", path.display()))?;
                ReaderStream::new(file).boxed()
            };

            let mut req = CreateObjectRequest::new(target.object, contents);
            req.attrs.content_type = content_type.unwrap_or_default();
            req.generation_precondition = if_generation_match;

            let o = bucket.create_object(req).await?;
            info!(object=%o.name, generation=o.generation, "created");
            print_json(&o)?;
        }
        Command::Set {
            uri,
            content_type,
            content_encoding,
            content_language,
            cache_control,
            metadata,
        } => {
            let target = object_uri(&uri)?;
            let bucket = config.open_bucket(&target.bucket)?;
            let req = UpdateObjectRequest {
                content_type: FieldUpdate::from_ptr(content_type),
                content_encoding: FieldUpdate::from_ptr(content_encoding),
                content_language: FieldUpdate::from_ptr(content_language),
                cache_control: FieldUpdate::from_ptr(cache_control),
                metadata: parse_metadata_args(&metadata)?,
                ..UpdateObjectRequest::new(target.object)
            };

            let o = bucket.update_object(&req).await?;
            print_json(&o)?;
        }
        Command::Rm { uri } => {
            let target = object_uri(&uri)?;
            let bucket = config.open_bucket(&target.bucket)?;
            bucket.delete_object(&target.object).await?;
            info!(object=%target.object, "deleted");
        }
        Command::Ls {
            uri,
            delimiter,
            max_results,
            page_token,
        } => {
            let target = parse_object_uri(&uri)?;
            let bucket = config.open_bucket(&target.bucket)?;
            let query = Query {
                prefix: target.object,
                delimiter: delimiter.unwrap_or_default(),
                cursor: page_token.unwrap_or_default(),
                max_results: max_results.unwrap_or(0),
                ..Default::default()
            };

            let listing = bucket.list_objects(&query).await?;
            for prefix in &listing.prefixes {
                println!("gs://{}/{}", target.bucket, prefix);
            }
            for o in &listing.results {
                println!("{:>12}  gs://{}/{}", o.size, target.bucket, o.name);
            }
            if let Some(next) = listing.next {
                eprintln!("next page token: {}", next.cursor);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_metadata_args() {
        let cases = vec![
            (vec![], Some(None)),
            (
                vec!["a=1", "b="],
                Some(Some(BTreeMap::from([
                    ("a".to_string(), Some("1".to_string())),
                    ("b".to_string(), None),
                ]))),
            ),
            (
                vec!["a=x=y"],
                Some(Some(BTreeMap::from([("a".to_string(), Some("x=y".to_string()))]))),
            ),
            (vec!["novalue"], None),
            (vec!["=1"], None),
        ];

        for (input, expected) in cases {
            let owned: Vec<String> = input.iter().map(|s| s.to_string()).collect();
            let result = parse_metadata_args(&owned).ok();
            assert_eq!(result, expected, "failed for case: {:?}", input);
        }
    }

    #[test]
    fn test_config_merge() {
        let env = HashMap::from([
            ("OBJECTGCS_PROJECT", "env-project"),
            ("OBJECTGCS_ACCESS_TOKEN", "env-token"),
            ("OBJECTGCS_API_BASE", "http://localhost:4443/storage/v1"),
        ]);
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        let config = CliConfig::merge(&args(&["objectgcs", "rm", "gs://b/o"]), lookup);
        assert_eq!(config.project_id, "env-project");
        assert_eq!(config.access_token.as_deref(), Some("env-token"));
        assert_eq!(config.storage_host, None);

        let config = CliConfig::merge(
            &args(&["objectgcs", "--project", "arg-project", "rm", "gs://b/o"]),
            lookup,
        );
        assert_eq!(config.project_id, "arg-project");

        let bucket = config.bucket_config("b");
        assert_eq!(bucket.name, "b");
        assert_eq!(bucket.api_base, "http://localhost:4443/storage/v1/");
        assert_eq!(bucket.storage_host, "storage.googleapis.com");
    }

    #[test]
    fn test_object_uri() {
        assert!(object_uri("gs://b/o").is_ok());
        assert!(object_uri("gs://b/").is_err());
        assert!(object_uri("gs://b").is_err());
    }

    #[test]
    fn test_args_subcommands() {
        let parsed = args(&[
            "objectgcs",
            "set",
            "gs://b/o",
            "--content-type",
            "",
            "--metadata",
            "a=1",
            "--metadata",
            "b=",
        ]);
        match parsed.command {
            Command::Set {
                content_type,
                metadata,
                cache_control,
                ..
            } => {
                assert_eq!(content_type.as_deref(), Some(""));
                assert_eq!(cache_control, None);
                assert_eq!(metadata, vec!["a=1".to_string(), "b=".to_string()]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
