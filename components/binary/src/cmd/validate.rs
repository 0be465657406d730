use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
    process::Command,
};

use clap::Args;
use hikari_common::{HIKARI_CLIENT_CONF_DIR_ENV, HIKARI_SERVER_CONF_DIR_ENV};
use regex::Regex;
use snafu::{ensure_whatever, OptionExt, ResultExt, Snafu, Whatever};

// Site files kept in parity between client and server conf dirs.
const SITE_FILES: [&str; 2] = ["core-site.toml", "hdfs-site.toml"];

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Validate the deployment environment of a hikari process: attempt a
kerberos login with the configured principal and keytab, then compare
the client-side and server-side site files key by key. The command
touches no cache state and exits non-zero when any check fails.
")]
pub struct ValidateArgs {
    #[arg(
        value_name = "PROCESS",
        help = "process on behalf of which the validation runs",
        value_parser = ["master", "worker"],
    )]
    pub process: String,

    #[arg(
        long,
        help = "principal used to log in to the secure under-store, like 'hikari/host@REALM'"
    )]
    pub principal: String,

    #[arg(long, help = "path to the keytab holding the principal's key")]
    pub keytab: PathBuf,

    #[arg(
        long,
        help = "client-side configuration directory; falls back to HIKARI_CLIENT_CONF_DIR"
    )]
    pub client_conf_dir: Option<PathBuf>,

    #[arg(
        long,
        help = "server-side configuration directory; falls back to HIKARI_SERVER_CONF_DIR"
    )]
    pub server_conf_dir: Option<PathBuf>,
}

#[derive(Snafu, Debug)]
enum ValidateError {
    #[snafu(display("principal {principal:?} is not of the form primary[/instance][@realm]"))]
    MalformedPrincipal { principal: String },

    #[snafu(display("kerberos login failed for {principal} with keytab {keytab:?} (exit {code})"))]
    LoginFailed {
        principal: String,
        keytab: PathBuf,
        code: i32,
    },

    #[snafu(display("failed to spawn kinit"))]
    LoginProcess { source: std::io::Error },

    #[snafu(display("{what} unspecified: pass {flag} or set {env}"))]
    ConfigurationMissing {
        what: String,
        flag: String,
        env: String,
    },

    #[snafu(display("failed to read {path:?}"))]
    ReadSiteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse {path:?}"))]
    ParseSiteFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// One client-side key whose value the server disagrees with.
#[derive(Debug, Eq, PartialEq)]
struct Mismatch {
    file: String,
    key: String,
    client: String,
    server: Option<String>,
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.server {
            Some(server) => write!(
                f,
                "for {} in {}, client has {:?}, but server has {:?}",
                self.key, self.file, self.client, server
            ),
            None => write!(
                f,
                "for {} in {}, client has {:?}, but server has nothing",
                self.key, self.file, self.client
            ),
        }
    }
}

impl ValidateArgs {
    pub fn run(self) -> Result<(), Whatever> {
        let ok = self.validate();
        ensure_whatever!(ok, "validation failed for {} process", self.process);
        println!("validation passed for {} process", self.process);
        Ok(())
    }

    /// Run every check, print one diagnostic line per failure, and
    /// report the combined outcome.
    fn validate(&self) -> bool {
        let mut pass = true;
        if let Err(e) = self.validate_principal_login() {
            eprintln!("principal login check failed: {}", e);
            pass = false;
        }
        match self.validate_setting_parity() {
            Ok(mismatches) if mismatches.is_empty() => {}
            Ok(mismatches) => {
                for m in &mismatches {
                    eprintln!("{}", m);
                }
                eprintln!(
                    "{} configuration keys differ between client and server",
                    mismatches.len()
                );
                pass = false;
            }
            Err(e) => {
                eprintln!("configuration parity check failed: {}", e);
                pass = false;
            }
        }
        pass
    }

    fn validate_principal_login(&self) -> Result<(), ValidateError> {
        let (primary, instance, realm) =
            parse_principal(&self.principal).context(MalformedPrincipalSnafu {
                principal: &self.principal,
            })?;
        let status = Command::new("kinit")
            .arg("-kt")
            .arg(&self.keytab)
            .arg(&self.principal)
            .status()
            .context(LoginProcessSnafu)?;
        if !status.success() {
            eprintln!(
                "parsed principal: primary {}, instance {:?}, realm {:?}",
                primary, instance, realm
            );
            return LoginFailedSnafu {
                principal: &self.principal,
                keytab: &self.keytab,
                code: status.code().unwrap_or(-1),
            }
            .fail();
        }
        Ok(())
    }

    fn validate_setting_parity(&self) -> Result<Vec<Mismatch>, ValidateError> {
        let client_dir = resolve_conf_dir(
            self.client_conf_dir.clone(),
            HIKARI_CLIENT_CONF_DIR_ENV,
            "--client-conf-dir",
            "client configuration directory",
        )?;
        let server_dir = resolve_conf_dir(
            self.server_conf_dir.clone(),
            HIKARI_SERVER_CONF_DIR_ENV,
            "--server-conf-dir",
            "server configuration directory",
        )?;
        setting_parity(&client_dir, &server_dir)
    }
}

/// Principal grammar: `primary[/instance][@realm]`.
fn parse_principal(principal: &str) -> Option<(String, Option<String>, Option<String>)> {
    let pattern = Regex::new(r"^(?P<primary>\w[\w-]*\$?)(?:/(?P<instance>\w+))?(?:@(?P<realm>\w+))?$")
        .expect("principal pattern is valid");
    let caps = pattern.captures(principal)?;
    Some((
        caps["primary"].to_string(),
        caps.name("instance").map(|m| m.as_str().to_string()),
        caps.name("realm").map(|m| m.as_str().to_string()),
    ))
}

fn resolve_conf_dir(
    arg: Option<PathBuf>,
    env: &str,
    flag: &str,
    what: &str,
) -> Result<PathBuf, ValidateError> {
    if let Some(path) = arg {
        return Ok(path);
    }
    match std::env::var(env) {
        Ok(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => ConfigurationMissingSnafu { what, flag, env }.fail(),
    }
}

/// Report every client-side key whose value differs from, or is absent
/// on, the server. Each key appears at most once per site file.
fn setting_parity(client_dir: &Path, server_dir: &Path) -> Result<Vec<Mismatch>, ValidateError> {
    let mut mismatches = Vec::new();
    for site in SITE_FILES {
        let client = load_site_file(&client_dir.join(site))?;
        let server = load_site_file(&server_dir.join(site))?;
        for (key, value) in client {
            match server.get(&key) {
                Some(v) if *v == value => {}
                other => mismatches.push(Mismatch {
                    file: site.to_string(),
                    key,
                    client: value,
                    server: other.cloned(),
                }),
            }
        }
    }
    Ok(mismatches)
}

fn load_site_file(path: &Path) -> Result<BTreeMap<String, String>, ValidateError> {
    let raw = std::fs::read_to_string(path).context(ReadSiteFileSnafu { path })?;
    toml::from_str(&raw).context(ParseSiteFileSnafu { path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_grammar() {
        assert_eq!(
            parse_principal("hikari"),
            Some(("hikari".to_string(), None, None))
        );
        assert_eq!(
            parse_principal("hikari/host1"),
            Some(("hikari".to_string(), Some("host1".to_string()), None))
        );
        assert_eq!(
            parse_principal("hikari/host1@EXAMPLE"),
            Some((
                "hikari".to_string(),
                Some("host1".to_string()),
                Some("EXAMPLE".to_string())
            ))
        );
        assert_eq!(
            parse_principal("svc-worker$@EXAMPLE"),
            Some(("svc-worker$".to_string(), None, Some("EXAMPLE".to_string())))
        );

        assert_eq!(parse_principal(""), None);
        assert_eq!(parse_principal("/host"), None);
        assert_eq!(parse_principal("a@b@c"), None);
        assert_eq!(parse_principal("has space"), None);
    }

    #[test]
    fn conf_dir_resolution() {
        let explicit = resolve_conf_dir(
            Some(PathBuf::from("/etc/hikari")),
            "HIKARI_TEST_UNSET_DIR",
            "--server-conf-dir",
            "server configuration directory",
        )
        .unwrap();
        assert_eq!(explicit, PathBuf::from("/etc/hikari"));

        std::env::set_var("HIKARI_TEST_CONF_DIR", "/srv/hikari");
        let from_env = resolve_conf_dir(
            None,
            "HIKARI_TEST_CONF_DIR",
            "--server-conf-dir",
            "server configuration directory",
        )
        .unwrap();
        assert_eq!(from_env, PathBuf::from("/srv/hikari"));

        let missing = resolve_conf_dir(
            None,
            "HIKARI_TEST_UNSET_DIR",
            "--server-conf-dir",
            "server configuration directory",
        )
        .unwrap_err();
        assert!(matches!(
            missing,
            ValidateError::ConfigurationMissing { .. }
        ));
        assert!(missing.to_string().contains("--server-conf-dir"));
    }

    fn write_site(dir: &Path, site: &str, body: &str) {
        std::fs::write(dir.join(site), body).unwrap();
    }

    #[test]
    fn parity_reports_each_mismatched_key_once() {
        let client = tempfile::tempdir().unwrap();
        let server = tempfile::tempdir().unwrap();

        write_site(
            client.path(),
            "core-site.toml",
            "\"fs.default.name\" = \"hikari://a:19998\"\n\"io.bytes.per.checksum\" = \"512\"\n",
        );
        write_site(
            server.path(),
            "core-site.toml",
            "\"fs.default.name\" = \"hikari://b:19998\"\n\"io.bytes.per.checksum\" = \"512\"\n",
        );
        write_site(
            client.path(),
            "hdfs-site.toml",
            "\"dfs.replication\" = \"3\"\n",
        );
        write_site(server.path(), "hdfs-site.toml", "");

        let mismatches = setting_parity(client.path(), server.path()).unwrap();
        assert_eq!(mismatches.len(), 2);
        assert_eq!(
            mismatches[0],
            Mismatch {
                file: "core-site.toml".to_string(),
                key: "fs.default.name".to_string(),
                client: "hikari://a:19998".to_string(),
                server: Some("hikari://b:19998".to_string()),
            }
        );
        assert_eq!(
            mismatches[1],
            Mismatch {
                file: "hdfs-site.toml".to_string(),
                key: "dfs.replication".to_string(),
                client: "3".to_string(),
                server: None,
            }
        );
        assert!(mismatches[1].to_string().contains("server has nothing"));
    }

    #[test]
    fn parity_passes_on_identical_settings() {
        let client = tempfile::tempdir().unwrap();
        let server = tempfile::tempdir().unwrap();
        for dir in [client.path(), server.path()] {
            write_site(dir, "core-site.toml", "\"fs.default.name\" = \"hikari://a\"\n");
            write_site(dir, "hdfs-site.toml", "\"dfs.replication\" = \"3\"\n");
        }
        assert!(setting_parity(client.path(), server.path())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn parity_requires_resolvable_files() {
        let client = tempfile::tempdir().unwrap();
        let server = tempfile::tempdir().unwrap();
        let err = setting_parity(client.path(), server.path()).unwrap_err();
        assert!(matches!(err, ValidateError::ReadSiteFile { .. }));
    }
}
