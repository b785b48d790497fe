//! Controller configuration checks.

use super::ValidationResult;
use crate::schema::ControllerConfig;

pub(super) fn validate_required(config: &ControllerConfig, result: &mut ValidationResult) {
    if config.host.is_empty() {
        result.error("controller.host", "controller host is empty");
    }
    if config.port.is_empty() {
        result.error("controller.port", "controller port is empty");
    } else if config.port.parse::<u16>().is_err() {
        result.warn(
            "controller.port",
            format!("controller port '{}' is not a number", config.port),
        );
    }
    if config.account_name.is_empty() {
        result.error("controller.accountName", "controller account name is empty");
    }
    if config.access_key.is_empty() && config.access_key_secret.is_empty() {
        result.error(
            "controller.accessKey",
            "accessKey or accessKeySecret must be specified",
        );
    }
    if !config.access_key_secret.is_empty() && config.access_key_secret_key.is_empty() {
        result.warn(
            "controller.accessKeySecretKey",
            "accessKeySecret is set without accessKeySecretKey",
        );
    }
}

pub(super) fn validate_proxy(config: &ControllerConfig, result: &mut ValidationResult) {
    if !config.use_proxy {
        return;
    }
    if config.proxy_host.is_empty() || config.proxy_port.is_empty() {
        result.warn(
            "controller.proxyHost",
            "useProxy is set but proxyHost or proxyPort is empty",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::validate_controller;
    use crate::schema::ControllerConfig;

    fn complete() -> ControllerConfig {
        ControllerConfig {
            host: "controller.example.com".into(),
            port: "443".into(),
            account_name: "customer1".into(),
            access_key: "abc".into(),
            ..Default::default()
        }
    }

    #[test]
    fn complete_config_is_valid() {
        let result = validate_controller(&complete());
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn secret_satisfies_access_key_requirement() {
        let config = ControllerConfig {
            access_key: String::new(),
            access_key_secret: "appd-secret".into(),
            access_key_secret_key: "access-key".into(),
            ..complete()
        };
        assert!(validate_controller(&config).valid);
    }

    #[test]
    fn missing_fields_are_reported_individually() {
        let result = validate_controller(&ControllerConfig::default());
        assert!(!result.valid);
        let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "controller.host",
                "controller.port",
                "controller.accountName",
                "controller.accessKey"
            ]
        );
    }

    #[test]
    fn incomplete_proxy_warns() {
        let config = ControllerConfig {
            use_proxy: true,
            proxy_host: "proxy.local".into(),
            ..complete()
        };
        let result = validate_controller(&config);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }
}
