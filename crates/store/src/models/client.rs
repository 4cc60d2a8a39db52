use crate::models::Id;
use time::Date;

/// A registered reader.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Client {
    #[sqlx(rename = "client_id")]
    pub id: Option<Id>,
    #[sqlx(rename = "client_name")]
    pub name: String,
    pub address: String,
    pub registered_on: Date,
}
impl Client {
    pub fn new(name: impl Into<String>, address: impl Into<String>, registered_on: Date) -> Self {
        Self { id: None, name: name.into(), address: address.into(), registered_on }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }
}
