//! Builder for connecting sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use secrecy::SecretString;

use super::session::Session;
use crate::channel::CliChannel;
use crate::config::SessionConfig;
use crate::error::{ConnectError, Error, Result};
use crate::operator::Operator;
use crate::platform::ProfileRegistry;
use crate::transport::{
    AuthMethod, Connector, Credentials, HostKeyVerification, NetworkConnector, Protocol,
    SshConfig, Target, connect_best_ssh,
};

/// Texts a Telnet login answers a bad password with.
const LOGIN_REFUSALS: [&str; 2] = ["% Authentication failed", "Login invalid"];

/// How [`SessionBuilder::connect`] reaches the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectMethod {
    #[default]
    Ssh2,
    Ssh1,
    /// SSH2, then one SSH1 attempt.
    BestSsh,
    Telnet,
}

/// Builder for connected sessions.
///
/// # Example
///
/// ```rust,no_run
/// use netscribe::{ConnectMethod, SessionBuilder};
///
/// # async fn example() -> Result<(), netscribe::Error> {
/// let mut session = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .method(ConnectMethod::BestSsh)
///     .connect()
///     .await?;
/// println!("{}", session.get_output("show clock").await?);
/// session.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    port: Option<u16>,
    username: Option<String>,
    auth: AuthMethod,
    method: ConnectMethod,
    enable_secret: Option<String>,
    operator: Option<Arc<dyn Operator>>,
    connector: Option<Arc<dyn Connector>>,
    profiles: Option<ProfileRegistry>,
    config: SessionConfig,
    ssh: SshConfig,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: None,
            auth: AuthMethod::None,
            method: ConnectMethod::default(),
            enable_secret: None,
            operator: None,
            connector: None,
            profiles: None,
            config: SessionConfig::default(),
            ssh: SshConfig::default(),
        }
    }

    /// Set the port (default: the protocol's well-known port).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication. Telnet logins use it too.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication (SSH only).
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    pub fn method(mut self, method: ConnectMethod) -> Self {
        self.method = method;
        self
    }

    /// Secret for enable mode. Without it the operator is asked.
    pub fn enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(secret.into());
        self
    }

    pub fn operator(mut self, operator: Arc<dyn Operator>) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Open transports through `connector` instead of real sockets.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Override the per-OS profiles.
    pub fn profiles(mut self, profiles: ProfileRegistry) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.ssh.host_key_verification = mode;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssh.known_hosts_path = Some(path.into());
        self
    }

    /// Set PTY dimensions for SSH.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.ssh.terminal_width = width;
        self.ssh.terminal_height = height;
        self
    }

    /// Open the transport, log in and discover the prompt.
    ///
    /// The session is not started; call [`Session::start`] or
    /// [`Session::run`] next.
    pub async fn connect(self) -> Result<Session> {
        let username = self.username.ok_or_else(|| Error::InvalidConfig {
            message: "Username is required".to_string(),
        })?;
        self.config.validate()?;

        let target = Target {
            host: self.host,
            port: self.port,
            credentials: Credentials {
                username,
                auth: self.auth,
            },
        };
        let connect_timeout = self.config.connect_timeout;
        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(NetworkConnector::new(SshConfig {
                timeout: connect_timeout,
                ..self.ssh
            })),
        };

        debug!("Connecting to {} with {:?}", target.host, self.method);
        let transport = match self.method {
            ConnectMethod::Ssh2 => connector.connect(Protocol::Ssh2, &target).await?,
            ConnectMethod::Ssh1 => connector.connect(Protocol::Ssh1, &target).await?,
            ConnectMethod::BestSsh => connect_best_ssh(connector.as_ref(), &target).await?,
            ConnectMethod::Telnet => connector.connect(Protocol::Telnet, &target).await?,
        };
        let protocol = transport.protocol();

        let mut session = Session::attach(transport, self.config)?;
        if let Some(operator) = self.operator {
            session = session.with_operator(operator);
        }
        if let Some(secret) = self.enable_secret {
            session = session.with_enable_secret(secret);
        }
        if let Some(profiles) = self.profiles {
            session = session.with_profiles(profiles);
        }

        let endings = session.config().prompt_endings.clone();
        let channel = session.channel_mut()?;
        if protocol == Protocol::Telnet {
            telnet_login(channel, &target.credentials, &endings, connect_timeout).await?;
        } else {
            let endings: Vec<&str> = endings.iter().map(String::as_str).collect();
            channel.read_until(&endings, connect_timeout).await?;
        }

        session.discover_prompt().await?;
        info!(
            "Connected to {} over {} as {}",
            target.host,
            protocol,
            session.hostname().unwrap_or_default()
        );
        Ok(session)
    }
}

/// Answer Telnet username/password prompts until a prompt ending shows.
async fn telnet_login(
    channel: &mut CliChannel,
    credentials: &Credentials,
    endings: &[String],
    timeout: Duration,
) -> Result<()> {
    let failed = || ConnectError::AuthenticationFailed {
        user: credentials.username.clone(),
    };

    let mut first = vec!["sername", "assword"];
    first.extend(endings.iter().map(String::as_str));
    let mut reply = channel.read_until(&first, timeout).await?;
    if reply.index > 2 {
        debug!("Telnet line has no login");
        return Ok(());
    }
    if reply.is(1) {
        channel.send_line(&credentials.username).await?;
        reply = channel.read_until(&["assword"], timeout).await?;
    }
    debug!("Telnet login matched {:?}", reply.matched);

    let password = credentials.password_text().ok_or_else(|| Error::InvalidConfig {
        message: "Telnet login needs a password".to_string(),
    })?;
    channel.send_secret(password).await?;

    let mut after: Vec<&str> = LOGIN_REFUSALS.to_vec();
    after.extend(["sername", "assword"]);
    after.extend(endings.iter().map(String::as_str));
    let outcome = channel.read_until(&after, timeout).await?;
    if outcome.index <= LOGIN_REFUSALS.len() + 2 {
        return Err(failed().into());
    }
    Ok(())
}
