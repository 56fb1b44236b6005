use bitbanker_sdk::client::{ClientConfig, BASE_URL, DEFAULT_TIMEOUT_SECONDS};
use bitbanker_sdk::{AsyncBitbankerClient, BitbankerClient, Error};
use secrecy::ExposeSecret;
use serial_test::serial;
use std::env;

fn clear_env() {
    env::remove_var("BITBANKER_API_KEY");
    env::remove_var("BITBANKER_API_BASE_URL");
    env::remove_var("BITBANKER_TIMEOUT_SECONDS");
}

#[cfg(test)]
mod config_documentation_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_documented_environment_variables() {
        clear_env();
        env::set_var("BITBANKER_API_KEY", "env-key");
        env::set_var("BITBANKER_API_BASE_URL", "http://127.0.0.1:8080/api");
        env::set_var("BITBANKER_TIMEOUT_SECONDS", "30");

        let config = ClientConfig::from_env().expect("Should create config from documented env vars");

        assert_eq!(config.api_key().expose_secret(), "env-key");
        assert_eq!(config.base_url().as_str(), "http://127.0.0.1:8080/api");
        assert_eq!(config.timeout_seconds(), 30);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_documented_defaults() {
        clear_env();
        env::set_var("BITBANKER_API_KEY", "env-key");

        let config = ClientConfig::from_env().expect("Should create config with defaults");

        assert_eq!(config.base_url().as_str(), BASE_URL, "Default base URL should be production");
        assert_eq!(
            config.timeout_seconds(),
            DEFAULT_TIMEOUT_SECONDS,
            "Default timeout should be 5 seconds"
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        clear_env();
        let err = ClientConfig::from_env().unwrap_err();
        assert!(matches!(err, Error::MissingEnvVar(ref name) if name == "BITBANKER_API_KEY"));
        assert_eq!(err.to_string(), "Missing BITBANKER_API_KEY environment variable");
    }

    #[test]
    #[serial]
    fn test_invalid_values() {
        clear_env();
        env::set_var("BITBANKER_API_KEY", "env-key");

        env::set_var("BITBANKER_TIMEOUT_SECONDS", "abc");
        let result = ClientConfig::from_env();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid BITBANKER_TIMEOUT_SECONDS"));

        env::set_var("BITBANKER_TIMEOUT_SECONDS", "0");
        let result = ClientConfig::from_env();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("timeout_seconds must be greater than 0"));
        env::remove_var("BITBANKER_TIMEOUT_SECONDS");

        env::set_var("BITBANKER_API_BASE_URL", "not a url");
        let result = ClientConfig::from_env();
        assert!(matches!(result, Err(Error::UrlParse(_))));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_clients_from_env() {
        clear_env();
        env::set_var("BITBANKER_API_KEY", "env-key");

        assert!(BitbankerClient::from_env().is_ok());
        assert!(AsyncBitbankerClient::from_env().is_ok());

        clear_env();
        assert!(BitbankerClient::from_env().is_err());
    }
}
