#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::error::Result;
    use std::io::Write;

    fn password_host(hostname: &str) -> HostConfig {
        HostConfig {
            hostname: hostname.to_string(),
            username: "svc".to_string(),
            port: 22,
            password: Some("secret".to_string()),
            ssh_key_path: None,
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.listen_host, "0.0.0.0");
        assert_eq!(config.listen_port, 9001);
        assert_eq!(config.poll_interval_secs, Some(10));
        assert!(config.hosts.is_empty());
    }

    #[test]
    fn test_host_requires_exactly_one_credential() {
        let mut host = password_host("alpha");
        assert!(host.validate().is_ok());

        host.ssh_key_path = Some("/home/svc/.ssh/id_ed25519".into());
        assert!(host.validate().is_err()); // both set

        host.password = None;
        assert!(host.validate().is_ok()); // key only

        host.ssh_key_path = None;
        assert!(host.validate().is_err()); // neither set
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 9100,
            poll_interval_secs: Some(30),
            hosts: vec![password_host("alpha"), password_host("beta")],
        };

        // Test serialization
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("127.0.0.1"));
        assert!(yaml.contains("alpha"));

        // Test deserialization
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(deserialized.listen_port, 9100);
        assert_eq!(deserialized.hosts.len(), 2);
        assert_eq!(deserialized.hosts[1].hostname, "beta");
    }

    #[test]
    fn test_null_poll_interval_means_run_once() {
        let yaml = "listen_host: 0.0.0.0\nlisten_port: 9001\npoll_interval_secs: null\nhosts: []\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.poll_interval_secs, None);

        // an absent interval behaves the same as an explicit null
        let yaml = "listen_host: 0.0.0.0\nlisten_port: 9001\nhosts: []\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.poll_interval_secs, None);
    }

    #[test]
    fn test_host_port_defaults_to_22() {
        let yaml = "hostname: alpha\nusername: svc\npassword: secret\n";
        let host: HostConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(host.port, 22);
    }

    #[test]
    fn test_config_default_path() {
        let path = Config::default_path();
        assert!(path.is_ok());

        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("fleetmux"));
        assert!(path.to_string_lossy().contains("config.yaml"));
    }

    #[test]
    fn test_config_load_missing() -> Result<()> {
        // Loading a non-existent config should return defaults
        let config = Config::load(Some("/nonexistent/config.yaml".into()))?;
        assert_eq!(config.listen_port, 9001);

        Ok(())
    }

    #[test]
    fn test_config_load_rejects_credentialless_host() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "listen_host: 0.0.0.0\nlisten_port: 9001\npoll_interval_secs: 10\nhosts:\n  - hostname: alpha\n    username: svc"
        )?;

        assert!(Config::load(Some(file.path().to_path_buf())).is_err());
        Ok(())
    }

    #[test]
    fn test_config_save_load() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("config.yaml");

        let original_config = Config {
            listen_port: 9200,
            hosts: vec![password_host("gamma")],
            ..Config::default()
        };

        original_config.save(config_path.clone())?;
        let loaded_config = Config::load(Some(config_path))?;

        assert_eq!(loaded_config.listen_port, 9200);
        assert_eq!(loaded_config.hosts.len(), 1);
        assert_eq!(loaded_config.hosts[0].hostname, "gamma");

        Ok(())
    }
}
