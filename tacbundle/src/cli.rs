use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use tacbundle::config::CollectorConfig;
use tacbundle::transfer::{Credentials, TransferRequest};
use tacbundle::transport::HostKeyVerification;

/// Collect a support bundle from an Arista EOS switch and deliver it to a
/// support case.
#[derive(Parser, Debug)]
#[clap(name = "tacbundle", version, about)]
pub struct Args {
    /// Device to collect from (ignored when running on the switch)
    #[clap(default_value = "localhost")]
    pub host: String,

    /// Login user on the device
    #[clap(short, long, env = "TACBUNDLE_USER", default_value = "admin")]
    pub user: String,

    /// Support case number; a placeholder is used when omitted
    #[clap(short, long = "case")]
    pub case_id: Option<String>,

    /// TOML configuration file
    #[clap(long, env = "TACBUNDLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Device password; prompted for when neither this nor --key is given
    #[clap(long, env = "TACBUNDLE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Private key for SSH authentication
    #[clap(short = 'i', long)]
    pub key: Option<PathBuf>,

    /// Passphrase for --key
    #[clap(long, env = "TACBUNDLE_KEY_PASSPHRASE", hide_env_values = true, requires = "key")]
    pub passphrase: Option<String>,

    /// SSH port
    #[clap(short, long)]
    pub port: Option<u16>,

    /// Host key checking against known_hosts
    #[clap(long, value_enum)]
    pub host_key_checking: Option<HostKeyChecking>,

    /// Local directory for downloaded bundles
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Extract the bundle after downloading it
    #[clap(long)]
    pub extract: bool,

    /// Verbosity (-v debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// How to deliver the bundle (default: download)
    #[clap(subcommand)]
    pub command: Option<Delivery>,
}

/// Delivery of the located bundle.
#[derive(Subcommand, Debug)]
pub enum Delivery {
    /// Copy the bundle to this machine
    Download,

    /// Have the device push the bundle with SCP
    Scp(ScpOpts),

    /// Have the device push the bundle to the vendor FTP drop
    Ftp(FtpOpts),
}

#[derive(ClapArgs, Debug)]
pub struct ScpOpts {
    /// Destination host
    pub host: String,

    /// Destination user
    #[clap(long)]
    pub user: String,

    /// Destination password
    #[clap(long, env = "TACBUNDLE_SCP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Destination port
    #[clap(long)]
    pub port: Option<u16>,

    /// Destination directory (default: /tmp/)
    #[clap(long)]
    pub path: Option<String>,

    /// VRF the device copies from
    #[clap(long)]
    pub vrf: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct FtpOpts {
    /// FTP server (default from configuration)
    #[clap(long)]
    pub host: Option<String>,

    /// FTP user (default from configuration)
    #[clap(long)]
    pub user: Option<String>,

    /// FTP password; for the anonymous drop, your email address
    #[clap(long, env = "TACBUNDLE_FTP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Upload directory (default from configuration, per case)
    #[clap(long)]
    pub path: Option<String>,

    /// VRF the device copies from
    #[clap(long)]
    pub vrf: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum HostKeyChecking {
    Strict,
    AcceptNew,
    Off,
}

impl From<HostKeyChecking> for HostKeyVerification {
    fn from(mode: HostKeyChecking) -> Self {
        match mode {
            HostKeyChecking::Strict => HostKeyVerification::Strict,
            HostKeyChecking::AcceptNew => HostKeyVerification::AcceptNew,
            HostKeyChecking::Off => HostKeyVerification::Disabled,
        }
    }
}

impl Args {
    /// Fold command-line overrides into `config`.
    pub fn apply(&self, config: &mut CollectorConfig) {
        if let Some(dir) = &self.output {
            config.local_dir = dir.clone();
        }
        if self.extract {
            config.extract = true;
        }
        if let Some(port) = self.port {
            config.ssh.port = port;
        }
        if let Some(mode) = self.host_key_checking {
            config.ssh.host_key_verification = mode.into();
        }
    }

    /// The transfer the operator asked for.
    pub fn transfer_request(&self, config: &CollectorConfig, case_id: &str) -> TransferRequest {
        match &self.command {
            None | Some(Delivery::Download) => TransferRequest::download(),
            Some(Delivery::Scp(opts)) => {
                let mut credentials = Credentials::new(&opts.user);
                if let Some(password) = &opts.password {
                    credentials = credentials.with_password(password);
                }
                let mut request = TransferRequest::secure_copy(&opts.host, credentials);
                if let Some(port) = opts.port {
                    request = request.with_port(port);
                }
                if let Some(path) = &opts.path {
                    request = request.with_path(path);
                }
                if let Some(vrf) = &opts.vrf {
                    request = request.with_vrf(vrf);
                }
                request
            }
            Some(Delivery::Ftp(opts)) => {
                let host = opts.host.as_deref().unwrap_or(&config.ftp.host);
                let user = opts.user.as_deref().unwrap_or(&config.ftp.username);
                let mut credentials = Credentials::new(user);
                if let Some(password) = &opts.password {
                    credentials = credentials.with_password(password);
                }
                let path = opts
                    .path
                    .clone()
                    .unwrap_or_else(|| config.ftp.directory_for(case_id));
                let mut request = TransferRequest::ftp(host, credentials).with_path(path);
                if let Some(vrf) = &opts.vrf {
                    request = request.with_vrf(vrf);
                }
                request
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tacbundle::transfer::TransferKind;

    #[test]
    fn test_default_is_download() {
        let args = Args::parse_from(["tacbundle", "leaf1", "-c", "123456"]);
        let request = args.transfer_request(&CollectorConfig::default(), "123456");
        assert_eq!(request.kind, TransferKind::Download);
        assert_eq!(args.case_id.as_deref(), Some("123456"));
    }

    #[test]
    fn test_ftp_defaults_from_config() {
        let args = Args::parse_from([
            "tacbundle", "leaf1", "ftp", "--password", "ops@example.com", "--vrf", "MGMT",
        ]);
        let request = args.transfer_request(&CollectorConfig::default(), "123456");
        assert_eq!(request.kind, TransferKind::UploadFtp);
        assert_eq!(request.destination_host.as_deref(), Some("ftp.arista.com"));
        assert_eq!(request.destination_path.as_deref(), Some("/support/123456/"));
        assert_eq!(request.vrf.as_deref(), Some("MGMT"));
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "tacbundle", "leaf1", "--extract", "-o", "/tmp/b", "--host-key-checking", "strict",
        ]);
        let mut config = CollectorConfig::default();
        args.apply(&mut config);
        assert!(config.extract);
        assert_eq!(config.local_dir, PathBuf::from("/tmp/b"));
        assert_eq!(config.ssh.host_key_verification, HostKeyVerification::Strict);
    }
}
