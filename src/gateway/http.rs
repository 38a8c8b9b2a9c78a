use super::{GatewayError, MaintenanceGateway, MaintenanceRequest, MaintenanceResponse, OperationKind};
use crate::config::GatewayConfig;
use crate::core::{RegistryError, Result};
use async_trait::async_trait;
use tracing::debug;

/// Gateway reaching the administration service over HTTP.
///
/// Parameters travel in the query string; false flags are left out
/// entirely (see [`super::MaintenanceParams`]).
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RegistryError::Config(format!("Cannot build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn route(&self, operation: OperationKind) -> &str {
        match operation {
            OperationKind::Provision | OperationKind::InstallExtensions => {
                &self.config.maintenance_path
            }
            OperationKind::SyncUser => &self.config.sync_user_path,
            OperationKind::ResetPassword => &self.config.reset_password_path,
        }
    }
}

#[async_trait]
impl MaintenanceGateway for HttpGateway {
    async fn execute(
        &self,
        request: &MaintenanceRequest,
    ) -> std::result::Result<MaintenanceResponse, GatewayError> {
        let url = self.config.endpoint(self.route(request.operation));
        let mut query = request.payload.to_query_pairs();
        query.push(("operationName", request.operation.as_str().to_string()));
        query.push(("databaseType", self.config.database_type.clone()));

        debug!(operation = %request.operation, key = %request.target, %url, "maintenance call");

        let mut builder = self.client.get(&url).query(&query);
        if let Some(token) = &self.config.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json::<MaintenanceResponse>().await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_per_operation() {
        let gateway = HttpGateway::new(GatewayConfig::new("http://admin.local")).unwrap();
        assert_eq!(gateway.route(OperationKind::Provision), "/maintenance");
        assert_eq!(gateway.route(OperationKind::InstallExtensions), "/maintenance");
        assert_eq!(gateway.route(OperationKind::SyncUser), "/sync-user");
        assert_eq!(gateway.route(OperationKind::ResetPassword), "/reset-password");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = GatewayConfig::new("http://admin.local").sync_user_path("sync");
        assert!(HttpGateway::new(config).is_err());
    }
}
