use crate::db::{Database, Scope};
use crate::utils::error::Result;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AddressTemplateRow {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub ip: String,
    pub hostname: Option<String>,
    pub allocation: Option<String>,
    pub default_gateway: Option<String>,
    pub dns: Option<String>,
    pub protocol: Option<String>,
    pub mask: Option<String>,
    pub network: Option<String>,
    /// JSON object text.
    pub ent_properties: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewAddressTemplate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ip: String,
    pub hostname: Option<String>,
    pub allocation: Option<String>,
    pub default_gateway: Option<String>,
    pub dns: Option<String>,
    pub protocol: Option<String>,
    pub mask: Option<String>,
    pub network: Option<String>,
    pub ent_properties: Option<String>,
}

const COLUMNS: &str = "id, name, description, ip, hostname, allocation, default_gateway, \
                       dns, protocol, mask, network, ent_properties";

impl Database {
    pub async fn address_templates(&self, scope: &Scope) -> Result<Vec<AddressTemplateRow>> {
        let sql = format!(
            "SELECT {} FROM address_templates WHERE driver = ? AND provider = ? ORDER BY id",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, AddressTemplateRow>(&sql)
            .bind(&scope.driver)
            .bind(&scope.provider)
            .fetch_all(self.pool())
            .await?)
    }

    pub async fn address_template(
        &self,
        scope: &Scope,
        id: i64,
    ) -> Result<Option<AddressTemplateRow>> {
        let sql = format!(
            "SELECT {} FROM address_templates WHERE id = ? AND driver = ? AND provider = ?",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, AddressTemplateRow>(&sql)
            .bind(id)
            .bind(&scope.driver)
            .bind(&scope.provider)
            .fetch_optional(self.pool())
            .await?)
    }

    pub async fn insert_address_template(
        &self,
        scope: &Scope,
        template: &NewAddressTemplate,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO address_templates \
             (name, description, ip, hostname, allocation, default_gateway, dns, protocol, \
              mask, network, ent_properties, driver, provider) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.ip)
        .bind(&template.hostname)
        .bind(&template.allocation)
        .bind(&template.default_gateway)
        .bind(&template.dns)
        .bind(&template.protocol)
        .bind(&template.mask)
        .bind(&template.network)
        .bind(&template.ent_properties)
        .bind(&scope.driver)
        .bind(&scope.provider)
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Returns `false` when no row matched.
    pub async fn delete_address_template(&self, scope: &Scope, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM address_templates WHERE id = ? AND driver = ? AND provider = ?",
        )
        .bind(id)
        .bind(&scope.driver)
        .bind(&scope.provider)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
