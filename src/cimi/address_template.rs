use crate::core::context::UrlBuilder;
use crate::db::{AddressTemplateRow, Database, NewAddressTemplate, Scope};
use crate::domain::capability::Capability;
use crate::domain::model::{AddressTemplate, OperationLink};
use crate::domain::ports::{Credentials, Driver};
use crate::utils::error::{DeltacloudError, Result};
use serde::Deserialize;

pub const DELETE_ACTION: &str = "http://schemas.dmtf.org/cimi/1/action/delete";

/// Everything a CIMI lookup needs from the current request.
pub struct CimiContext<'a> {
    pub driver: &'a dyn Driver,
    pub credentials: &'a Credentials,
    pub db: Option<&'a Database>,
    pub scope: &'a Scope,
    pub urls: &'a UrlBuilder,
}

impl CimiContext<'_> {
    fn db(&self) -> Result<&Database> {
        self.db
            .ok_or_else(|| DeltacloudError::not_supported("address_templates"))
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressTemplateCreate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub allocation: Option<String>,
    pub default_gateway: Option<String>,
    pub dns: Option<String>,
    pub protocol: Option<String>,
    pub mask: Option<String>,
    pub network: Option<String>,
    pub property: Option<serde_json::Map<String, serde_json::Value>>,
}

pub async fn find_all(ctx: &CimiContext<'_>) -> Result<Vec<AddressTemplate>> {
    if ctx.driver.supports(Capability::AddressTemplates) {
        return ctx.driver.address_templates(ctx.credentials).await;
    }
    ctx.db()?
        .address_templates(ctx.scope)
        .await?
        .into_iter()
        .map(|row| from_db(row, ctx.urls))
        .collect()
}

pub async fn find(ctx: &CimiContext<'_>, id: &str) -> Result<AddressTemplate> {
    if ctx.driver.supports(Capability::AddressTemplate) {
        return ctx
            .driver
            .address_template(ctx.credentials, id)
            .await?
            .ok_or_else(|| DeltacloudError::not_found("address_template", id));
    }
    let row_id = parse_id(id)?;
    let row = ctx
        .db()?
        .address_template(ctx.scope, row_id)
        .await?
        .ok_or_else(|| DeltacloudError::not_found("address_template", id))?;
    from_db(row, ctx.urls)
}

pub async fn delete(ctx: &CimiContext<'_>, id: &str) -> Result<()> {
    let row_id = parse_id(id)?;
    if !ctx.db()?.delete_address_template(ctx.scope, row_id).await? {
        return Err(DeltacloudError::not_found("address_template", id));
    }
    tracing::info!("Deleted address template {}", id);
    Ok(())
}

pub async fn create(ctx: &CimiContext<'_>, params: AddressTemplateCreate) -> Result<AddressTemplate> {
    let ip = match params.ip {
        Some(ip) if !ip.trim().is_empty() => ip,
        _ => return Err(DeltacloudError::validation("Parameter 'ip' is required")),
    };
    let ent_properties = params
        .property
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let row = NewAddressTemplate {
        name: params.name,
        description: params.description,
        ip,
        hostname: params.hostname,
        allocation: params.allocation,
        default_gateway: params.default_gateway,
        dns: params.dns,
        protocol: params.protocol,
        mask: params.mask,
        network: params.network,
        ent_properties,
    };

    let db = ctx.db()?;
    let id = db.insert_address_template(ctx.scope, &row).await?;
    tracing::info!("Created address template {}", id);
    let stored = db
        .address_template(ctx.scope, id)
        .await?
        .ok_or_else(|| DeltacloudError::not_found("address_template", &id.to_string()))?;
    from_db(stored, ctx.urls)
}

fn parse_id(id: &str) -> Result<i64> {
    id.parse()
        .map_err(|_| DeltacloudError::not_found("address_template", id))
}

pub fn from_db(row: AddressTemplateRow, urls: &UrlBuilder) -> Result<AddressTemplate> {
    let property = match row.ent_properties.as_deref() {
        Some(text) if !text.is_empty() => Some(serde_json::from_str(text)?),
        _ => None,
    };

    Ok(AddressTemplate {
        id: urls.address_template_url(row.id),
        name: row.name,
        description: row.description,
        ip: row.ip,
        hostname: row.hostname,
        allocation: row.allocation,
        default_gateway: row.default_gateway,
        dns: row.dns,
        protocol: row.protocol,
        mask: row.mask,
        network: row.network,
        property,
        operations: vec![OperationLink {
            href: urls.destroy_address_template_url(row.id),
            rel: DELETE_ACTION.to_string(),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::CapabilitySet;
    use crate::drivers::MockDriver;
    use async_trait::async_trait;

    /// A driver that keeps address templates itself.
    struct TemplateDriver;

    #[async_trait]
    impl Driver for TemplateDriver {
        fn name(&self) -> &'static str {
            "templates"
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::new(&[Capability::AddressTemplates])
        }

        async fn address_templates(&self, _credentials: &Credentials) -> Result<Vec<AddressTemplate>> {
            Ok(vec![AddressTemplate {
                id: "http://provider/at/1".to_string(),
                name: Some("provider-side".to_string()),
                description: None,
                ip: "192.0.2.1".to_string(),
                hostname: None,
                allocation: None,
                default_gateway: None,
                dns: None,
                protocol: None,
                mask: None,
                network: None,
                property: None,
                operations: Vec::new(),
            }])
        }
    }

    async fn database() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.upgrade().await.unwrap();
        db
    }

    fn row(id: i64, props: Option<&str>) -> AddressTemplateRow {
        AddressTemplateRow {
            id,
            name: Some("web".to_string()),
            description: Some("web tier".to_string()),
            ip: "10.0.0.5".to_string(),
            hostname: Some("web01".to_string()),
            allocation: Some("static".to_string()),
            default_gateway: Some("10.0.0.1".to_string()),
            dns: Some("10.0.0.2".to_string()),
            protocol: Some("IPv4".to_string()),
            mask: Some("255.255.255.0".to_string()),
            network: None,
            ent_properties: props.map(str::to_string),
        }
    }

    #[test]
    fn test_from_db() {
        let urls = UrlBuilder::new("http://localhost:3001");
        let template = from_db(row(3, Some(r#"{"tier":"web"}"#)), &urls).unwrap();

        assert_eq!(template.id, "http://localhost:3001/cimi/address_templates/3");
        assert_eq!(template.operations.len(), 1);
        assert_eq!(template.operations[0].rel, DELETE_ACTION);
        assert_eq!(template.operations[0].href, template.id);
        assert_eq!(
            template.property.unwrap().get("tier").unwrap().as_str(),
            Some("web")
        );
    }

    #[test]
    fn test_from_db_without_properties() {
        let urls = UrlBuilder::new("http://localhost:3001");
        assert!(from_db(row(1, None), &urls).unwrap().property.is_none());
    }

    #[tokio::test]
    async fn test_database_fallback() {
        let db = database().await;
        let driver = MockDriver::new();
        let credentials = Credentials::new("mockuser", "mockpassword");
        let scope = Scope::new("mock", None);
        let urls = UrlBuilder::new("http://localhost:3001");
        let ctx = CimiContext {
            driver: &driver,
            credentials: &credentials,
            db: Some(&db),
            scope: &scope,
            urls: &urls,
        };

        let created = create(
            &ctx,
            AddressTemplateCreate {
                ip: Some("10.0.0.7".to_string()),
                ..AddressTemplateCreate::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(find_all(&ctx).await.unwrap().len(), 1);

        let id = created.id.rsplit('/').next().unwrap().to_string();
        assert_eq!(find(&ctx, &id).await.unwrap().ip, "10.0.0.7");

        delete(&ctx, &id).await.unwrap();
        assert!(matches!(
            find(&ctx, &id).await,
            Err(DeltacloudError::NotFound { .. })
        ));
        assert!(matches!(
            find(&ctx, "not-a-number").await,
            Err(DeltacloudError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_requires_ip() {
        let db = database().await;
        let driver = MockDriver::new();
        let credentials = Credentials::new("mockuser", "mockpassword");
        let scope = Scope::new("mock", None);
        let urls = UrlBuilder::new("http://localhost:3001");
        let ctx = CimiContext {
            driver: &driver,
            credentials: &credentials,
            db: Some(&db),
            scope: &scope,
            urls: &urls,
        };

        let err = create(&ctx, AddressTemplateCreate::default()).await.unwrap_err();
        assert!(matches!(err, DeltacloudError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_driver_templates_take_precedence() {
        let driver = TemplateDriver;
        let credentials = Credentials::new("u", "p");
        let scope = Scope::new("templates", None);
        let urls = UrlBuilder::new("http://localhost:3001");
        let ctx = CimiContext {
            driver: &driver,
            credentials: &credentials,
            db: None,
            scope: &scope,
            urls: &urls,
        };

        let templates = find_all(&ctx).await.unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name.as_deref(), Some("provider-side"));
    }

    #[tokio::test]
    async fn test_without_database_or_driver_support() {
        let driver = MockDriver::new();
        let credentials = Credentials::new("mockuser", "mockpassword");
        let scope = Scope::new("mock", None);
        let urls = UrlBuilder::new("http://localhost:3001");
        let ctx = CimiContext {
            driver: &driver,
            credentials: &credentials,
            db: None,
            scope: &scope,
            urls: &urls,
        };

        assert!(matches!(
            find_all(&ctx).await,
            Err(DeltacloudError::NotSupported { .. })
        ));
    }
}
