//! Drives a small in-memory provider through configure, plan, CRUD, import
//! and state upgrade using only the public trait API

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, ReadDataSourceRequest, ReadDataSourceResponse,
};
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::planning::{plan_resource_change, upgrade_resource_state, validate_resource_config};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ReadResourceRequest, ReadResourceResponse, Resource,
    ResourceSchemaRequest, ResourceSchemaResponse, UpdateResourceRequest, UpdateResourceResponse,
    UpgradeResourceStateRequest, UpgradeResourceStateResponse,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue, HasErrors, RawState};
use tfplug::validator::StringNotWhitespace;
use tfplug::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tokio::sync::Mutex;

type Store = Arc<Mutex<HashMap<String, (String, String)>>>;

struct MemoryProvider {
    store: Store,
}

#[async_trait]
impl Provider for MemoryProvider {
    fn type_name(&self) -> &str {
        "memory"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: "memory".to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new().build(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        _request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(self.store.clone() as Arc<dyn Any + Send + Sync>),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "memory_item".to_string(),
            Box::new(|| Box::new(ItemResource { store: None }) as Box<dyn Resource>),
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "memory_count".to_string(),
            Box::new(|| Box::new(CountDataSource { store: None }) as Box<dyn DataSource>),
        );
        factories
    }
}

struct ItemResource {
    store: Option<Store>,
}

fn item_schema() -> Schema {
    SchemaBuilder::new()
        .version(1)
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .required()
                .validator(StringNotWhitespace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("kind", AttributeType::String)
                .optional()
                .computed()
                .default(StaticDefault::string("plain"))
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .build()
}

fn item_state(id: &str, name: &str, kind: &str) -> DynamicValue {
    let mut state = DynamicValue::object();
    state
        .set_string(&AttributePath::new("id"), id.to_string())
        .unwrap();
    state
        .set_string(&AttributePath::new("name"), name.to_string())
        .unwrap();
    state
        .set_string(&AttributePath::new("kind"), kind.to_string())
        .unwrap();
    state
}

#[async_trait]
impl Resource for ItemResource {
    fn type_name(&self) -> &str {
        "memory_item"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: item_schema(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        match request.provider_data.and_then(|d| d.downcast::<Mutex<HashMap<String, (String, String)>>>().ok()) {
            Some(store) => self.store = Some(store),
            None => diagnostics.push(Diagnostic::error("Provider not configured", "")),
        }
        ConfigureResourceResponse { diagnostics }
    }

    async fn create(
        &self,
        _ctx: Context,
        request: CreateResourceRequest,
    ) -> CreateResourceResponse {
        let store = self.store.as_ref().unwrap();
        let name = request
            .planned_state
            .get_string(&AttributePath::new("name"))
            .unwrap();
        let kind = request
            .planned_state
            .get_string(&AttributePath::new("kind"))
            .unwrap();
        let mut items = store.lock().await;
        let id = format!("item-{}", items.len() + 1);
        items.insert(id.clone(), (name.clone(), kind.clone()));
        CreateResourceResponse {
            new_state: item_state(&id, &name, &kind),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let store = self.store.as_ref().unwrap();
        let id = request
            .current_state
            .get_string(&AttributePath::new("id"))
            .unwrap();
        let new_state = store
            .lock()
            .await
            .get(&id)
            .map(|(name, kind)| item_state(&id, name, kind));
        ReadResourceResponse {
            new_state,
            diagnostics: vec![],
        }
    }

    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        let store = self.store.as_ref().unwrap();
        let id = request
            .prior_state
            .get_string(&AttributePath::new("id"))
            .unwrap();
        let name = request
            .planned_state
            .get_string(&AttributePath::new("name"))
            .unwrap();
        let kind = request
            .planned_state
            .get_string(&AttributePath::new("kind"))
            .unwrap();
        store
            .lock()
            .await
            .insert(id.clone(), (name.clone(), kind.clone()));
        UpdateResourceResponse {
            new_state: item_state(&id, &name, &kind),
            diagnostics: vec![],
        }
    }

    async fn delete(
        &self,
        _ctx: Context,
        request: DeleteResourceRequest,
    ) -> DeleteResourceResponse {
        let store = self.store.as_ref().unwrap();
        let id = request
            .prior_state
            .get_string(&AttributePath::new("id"))
            .unwrap();
        store.lock().await.remove(&id);
        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }

    async fn upgrade_state(
        &self,
        _ctx: Context,
        request: UpgradeResourceStateRequest,
    ) -> UpgradeResourceStateResponse {
        // v0 stored the name under "title" and had no kind
        let old = request.raw_state.decode().unwrap();
        let id = old.get_string(&AttributePath::new("id")).unwrap();
        let title = old.get_string(&AttributePath::new("title")).unwrap();
        UpgradeResourceStateResponse {
            upgraded_state: item_state(&id, &title, "plain"),
            diagnostics: vec![],
        }
    }
}

struct CountDataSource {
    store: Option<Store>,
}

#[async_trait]
impl DataSource for CountDataSource {
    fn type_name(&self) -> &str {
        "memory_count"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("count", AttributeType::Number)
                        .computed()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        self.store = request
            .provider_data
            .and_then(|d| d.downcast::<Mutex<HashMap<String, (String, String)>>>().ok());
        ConfigureDataSourceResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let count = self.store.as_ref().unwrap().lock().await.len();
        let mut state = DynamicValue::object();
        state
            .set_number(&AttributePath::new("count"), count as f64)
            .unwrap();
        ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        }
    }
}

async fn configured_item(provider: &mut MemoryProvider) -> Box<dyn Resource> {
    let configured = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: DynamicValue::object(),
            },
        )
        .await;
    assert!(!configured.diagnostics.has_errors());

    let factories = provider.resources();
    let mut resource = factories.get("memory_item").unwrap()();
    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: configured.provider_data,
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
    resource
}

fn name_config(name: &str) -> DynamicValue {
    let mut config = DynamicValue::object();
    config
        .set_string(&AttributePath::new("name"), name.to_string())
        .unwrap();
    config
}

#[tokio::test]
async fn full_lifecycle_through_the_trait_api() {
    let store: Store = Arc::new(Mutex::new(HashMap::new()));
    let mut provider = MemoryProvider {
        store: store.clone(),
    };
    let resource = configured_item(&mut provider).await;
    let schema = item_schema();

    let config = name_config("first");
    assert!(validate_resource_config(&schema, &config).is_empty());

    let plan = plan_resource_change(&schema, &DynamicValue::null(), &config);
    let created = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "memory_item".to_string(),
                planned_state: plan.planned_state,
                config: config.clone(),
            },
        )
        .await;
    assert!(created.diagnostics.is_empty());
    assert_eq!(
        created
            .new_state
            .get_string(&AttributePath::new("kind"))
            .unwrap(),
        "plain"
    );

    let renamed = name_config("second");
    let plan = plan_resource_change(&schema, &created.new_state, &renamed);
    assert!(plan.requires_replace.is_empty());
    let updated = resource
        .update(
            Context::new(),
            UpdateResourceRequest {
                type_name: "memory_item".to_string(),
                prior_state: created.new_state.clone(),
                planned_state: plan.planned_state,
                config: renamed,
            },
        )
        .await;
    assert_eq!(
        updated.new_state.get_string(&AttributePath::new("id")).unwrap(),
        "item-1"
    );

    resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "memory_item".to_string(),
                prior_state: updated.new_state.clone(),
            },
        )
        .await;

    let read = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "memory_item".to_string(),
                current_state: updated.new_state,
            },
        )
        .await;
    assert!(read.new_state.is_none());
    assert!(store.lock().await.is_empty());
}

#[tokio::test]
async fn changing_a_replace_attribute_is_flagged() {
    let schema = item_schema();
    let prior = item_state("item-1", "first", "plain");
    let mut config = name_config("first");
    config
        .set_string(&AttributePath::new("kind"), "fancy".to_string())
        .unwrap();

    let plan = plan_resource_change(&schema, &prior, &config);
    assert_eq!(plan.requires_replace, vec![AttributePath::new("kind")]);
}

#[tokio::test]
async fn import_is_unsupported_by_default() {
    let mut provider = MemoryProvider {
        store: Arc::new(Mutex::new(HashMap::new())),
    };
    let resource = configured_item(&mut provider).await;

    let response = resource
        .import_state(
            Context::new(),
            ImportResourceStateRequest {
                type_name: "memory_item".to_string(),
                id: "item-1".to_string(),
            },
        )
        .await;
    assert!(response.diagnostics.has_errors());
    assert!(response.imported_resources.is_empty());
}

#[tokio::test]
async fn upgrade_dispatch_depends_on_version() {
    let mut provider = MemoryProvider {
        store: Arc::new(Mutex::new(HashMap::new())),
    };
    let resource = configured_item(&mut provider).await;
    let schema = item_schema();

    let old = br#"{"id":"item-7","title":"legacy"}"#.to_vec();
    let upgraded = upgrade_resource_state(
        Context::new(),
        resource.as_ref(),
        &schema,
        UpgradeResourceStateRequest {
            type_name: "memory_item".to_string(),
            version: 0,
            raw_state: RawState::from_json(old),
        },
    )
    .await;
    assert!(upgraded.diagnostics.is_empty());
    assert_eq!(
        upgraded
            .upgraded_state
            .get_string(&AttributePath::new("name"))
            .unwrap(),
        "legacy"
    );

    let current = br#"{"id":"item-7","name":"n","kind":"plain"}"#.to_vec();
    let same = upgrade_resource_state(
        Context::new(),
        resource.as_ref(),
        &schema,
        UpgradeResourceStateRequest {
            type_name: "memory_item".to_string(),
            version: 1,
            raw_state: RawState::from_json(current),
        },
    )
    .await;
    assert_eq!(same.upgraded_state, item_state("item-7", "n", "plain"));

    let future = upgrade_resource_state(
        Context::new(),
        resource.as_ref(),
        &schema,
        UpgradeResourceStateRequest {
            type_name: "memory_item".to_string(),
            version: 2,
            raw_state: RawState::from_json(b"{}".to_vec()),
        },
    )
    .await;
    assert!(future.diagnostics.has_errors());
    assert!(future.diagnostics[0]
        .detail
        .starts_with("Upgrade failed: state for memory_item was written by a newer provider"));
}

#[tokio::test]
async fn data_source_reads_through_provider_data() {
    let store: Store = Arc::new(Mutex::new(HashMap::new()));
    store
        .lock()
        .await
        .insert("item-1".to_string(), ("a".to_string(), "plain".to_string()));
    let mut provider = MemoryProvider { store };
    let configured = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: DynamicValue::object(),
            },
        )
        .await;

    let factories = provider.data_sources();
    let mut data_source = factories.get("memory_count").unwrap()();
    data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: configured.provider_data,
            },
        )
        .await;

    let response = data_source
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "memory_count".to_string(),
                config: DynamicValue::object(),
            },
        )
        .await;
    assert_eq!(
        response.state.get(&AttributePath::new("count")),
        Some(&Dynamic::Number(1.0))
    );
}
