/// Builds absolute hrefs for rendered entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    base: String,
}

impl UrlBuilder {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn collection_url(&self, prefix: &str, collection: &str) -> String {
        self.url(&format!("{}/{}", prefix, collection))
    }

    pub fn entity_url(&self, prefix: &str, collection: &str, id: &str) -> String {
        self.url(&format!("{}/{}/{}", prefix, collection, id))
    }

    pub fn address_template_url(&self, id: i64) -> String {
        self.entity_url("/cimi", "address_templates", &id.to_string())
    }

    pub fn destroy_address_template_url(&self, id: i64) -> String {
        self.address_template_url(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let urls = UrlBuilder::new("http://localhost:3001/");
        assert_eq!(urls.collection_url("/api", "realms"), "http://localhost:3001/api/realms");
        assert_eq!(
            urls.entity_url("/api", "ports", "p1"),
            "http://localhost:3001/api/ports/p1"
        );
        assert_eq!(
            urls.address_template_url(7),
            "http://localhost:3001/cimi/address_templates/7"
        );
    }
}
