//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 写时复制的版本变更计划。
//!
//! 从当前版本的完整属性出发，只覆盖请求中显式设置的字段；
//! 覆盖结果与当前版本结构相同时不产生新版本。该模块无副作用，不需要加锁。

use super::request::{BlockDevice, MarketChanges, MutationRequest, TemplateChanges};
use crate::error::MutationError;
use crate::model::{Attributes, NewVersionPlan, VersionedResource};
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, instrument};

pub const IMAGE_ID: &str = "imageId";
pub const INSTANCE_TYPE: &str = "instanceType";
pub const IAM_INSTANCE_PROFILE: &str = "iamInstanceProfile";
pub const KEY_NAME: &str = "keyName";
pub const NETWORK_INTERFACES: &str = "networkInterfaces";
pub const RAMDISK_ID: &str = "ramDiskId";
pub const MONITORING: &str = "monitoring";
pub const EBS_OPTIMIZED: &str = "ebsOptimized";
pub const USER_DATA: &str = "userData";
pub const BLOCK_DEVICE_MAPPINGS: &str = "blockDeviceMappings";
pub const SECURITY_GROUP_IDS: &str = "securityGroupIds";
pub const SECURITY_GROUPS: &str = "securityGroups";
pub const INSTANCE_MARKET_OPTIONS: &str = "instanceMarketOptions";

pub const SPOT_MARKET: &str = "spot";
pub const DEFAULT_SPOT_INSTANCE_TYPE: &str = "one-time";

/// 由专用请求字段管理的属性
const MANAGED_FIELDS: &[&str] = &[
    IMAGE_ID,
    INSTANCE_TYPE,
    IAM_INSTANCE_PROFILE,
    KEY_NAME,
    NETWORK_INTERFACES,
    RAMDISK_ID,
    MONITORING,
    EBS_OPTIMIZED,
    USER_DATA,
    BLOCK_DEVICE_MAPPINGS,
    SECURITY_GROUP_IDS,
    SECURITY_GROUPS,
    INSTANCE_MARKET_OPTIONS,
];

/// 允许直接覆盖的启动模板数据字段
const PASSTHROUGH_FIELDS: &[&str] = &[
    "kernelId",
    "placement",
    "tagSpecifications",
    "elasticGpuSpecifications",
    "elasticInferenceAccelerators",
    "creditSpecification",
    "cpuOptions",
    "capacityReservationSpecification",
    "licenseSpecifications",
    "hibernationOptions",
    "metadataOptions",
    "enclaveOptions",
    "instanceRequirements",
    "privateDnsNameOptions",
    "maintenanceOptions",
    "disableApiTermination",
    "disableApiStop",
    "instanceInitiatedShutdownBehavior",
];

/// 资源类型是否支持该字段
pub fn is_supported_field(field: &str) -> bool {
    MANAGED_FIELDS.contains(&field) || PASSTHROUGH_FIELDS.contains(&field)
}

/// 计算新版本
///
/// 请求为空时 `changed` 必为 false；出错时不会产生任何提交
#[instrument(skip_all, level = "debug", fields(template = %current.identity, base = current.current_version_number))]
pub fn plan_mutation(
    current: &VersionedResource,
    request: &MutationRequest,
) -> Result<NewVersionPlan, MutationError> {
    if let Some(expected) = request.observed_version {
        if expected != current.current_version_number {
            return Err(MutationError::PreconditionFailed {
                expected,
                actual: current.current_version_number,
            });
        }
    }

    if request.target.launch_template_id != current.identity.launch_template_id {
        return Err(MutationError::InvalidField {
            field: "target".to_string(),
            reason: format!(
                "request targets {} but current version belongs to {}",
                request.target, current.identity
            ),
        });
    }

    let changes = &request.changes;
    validate(changes)?;

    let mut overlay = Overlay::new(&current.current_attributes);

    if let Some(image) = &changes.image {
        let image_id = image.image_id.as_deref().ok_or_else(|| MutationError::InvalidField {
            field: "image".to_string(),
            reason: format!("image `{}` has not been resolved to an id", image.name),
        })?;
        // 只有解析出的镜像 ID 与当前不同时才覆盖
        if overlay.str_field(IMAGE_ID) != Some(image_id) {
            overlay.set(IMAGE_ID, json!(image_id));
        }
    }

    if let Some(instance_type) = &changes.instance_type {
        overlay.set(INSTANCE_TYPE, json!(instance_type));
    }
    if let Some(role) = &changes.iam_role {
        overlay.set(IAM_INSTANCE_PROFILE, json!({ "name": role }));
    }
    if let Some(key_pair) = &changes.key_pair {
        overlay.set(KEY_NAME, json!(key_pair));
    }
    if let Some(associate) = changes.associate_public_ip_address {
        let interfaces = with_public_ip(overlay.get(NETWORK_INTERFACES), associate);
        overlay.set(NETWORK_INTERFACES, interfaces);
    }
    if let Some(ramdisk) = &changes.ramdisk_id {
        overlay.set(RAMDISK_ID, json!(ramdisk));
    }
    if let Some(enabled) = changes.instance_monitoring {
        overlay.set(MONITORING, json!({ "enabled": enabled }));
    }
    if let Some(ebs_optimized) = changes.ebs_optimized {
        overlay.set(EBS_OPTIMIZED, json!(ebs_optimized));
    }
    if let Some(user_data) = &changes.base64_user_data {
        overlay.set(USER_DATA, json!(user_data));
    }
    if let Some(devices) = &changes.block_devices {
        overlay.set(BLOCK_DEVICE_MAPPINGS, block_device_mappings(devices));
    }
    if let Some(requested) = &changes.security_groups {
        let field = security_group_field(&overlay);
        let current_groups = string_set(overlay.get(field));
        let mut groups: BTreeSet<String> = requested.iter().cloned().collect();
        if changes.security_groups_append_only {
            groups.extend(current_groups.iter().cloned());
        }
        // 按集合比较，仅顺序不同不算变化
        if groups != current_groups || overlay.get(field).is_none() {
            overlay.set(field, json!(groups));
        }
    }
    if !changes.market.is_empty() {
        overlay.set(INSTANCE_MARKET_OPTIONS, market_options(&changes.market)?);
    }
    for (field, value) in &changes.other {
        overlay.set(field, value.clone());
    }

    let (resulting_attributes, changed_fields) = overlay.finish();
    let changed = resulting_attributes != current.current_attributes;
    debug!("planned mutation: changed={}, fields={:?}", changed, changed_fields);

    Ok(NewVersionPlan {
        base_version_number: current.current_version_number,
        resulting_attributes,
        changed,
        changed_fields,
    })
}

fn validate(changes: &TemplateChanges) -> Result<(), MutationError> {
    for field in changes.other.keys() {
        if MANAGED_FIELDS.contains(&field.as_str()) {
            return Err(MutationError::InvalidField {
                field: field.clone(),
                reason: "managed by a dedicated request field".to_string(),
            });
        }
        if !is_supported_field(field) {
            return Err(MutationError::UnknownField(field.clone()));
        }
    }

    let non_empty = [
        ("instanceType", changes.instance_type.as_deref()),
        ("iamRole", changes.iam_role.as_deref()),
        ("keyPair", changes.key_pair.as_deref()),
        ("image", changes.image.as_ref().map(|i| i.name.as_str())),
    ];
    for (field, value) in non_empty {
        if value == Some("") {
            return Err(MutationError::InvalidField {
                field: field.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
    }

    if let Some(devices) = &changes.block_devices {
        let mut names = HashSet::new();
        for device in devices {
            if device.device_name.is_empty() || !names.insert(device.device_name.as_str()) {
                return Err(MutationError::InvalidField {
                    field: "blockDevices".to_string(),
                    reason: format!("invalid or duplicate device name `{}`", device.device_name),
                });
            }
        }
    }

    if changes.security_groups_append_only && changes.security_groups.is_none() {
        return Err(MutationError::InvalidField {
            field: "securityGroupsAppendOnly".to_string(),
            reason: "requires securityGroups".to_string(),
        });
    }

    Ok(())
}

/// 覆盖层：在当前属性副本上逐字段写入，记录实际变化的字段
struct Overlay<'a> {
    base: &'a Attributes,
    result: Attributes,
}

impl<'a> Overlay<'a> {
    fn new(base: &'a Attributes) -> Self {
        Self {
            base,
            result: base.clone(),
        }
    }

    fn get(&self, field: &str) -> Option<&Value> {
        self.result.get(field)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    fn set(&mut self, field: &str, value: Value) {
        self.result.insert(field.to_string(), value);
    }

    fn finish(self) -> (Attributes, BTreeSet<String>) {
        let changed = self
            .result
            .iter()
            .filter(|(field, value)| self.base.get(field.as_str()) != Some(*value))
            .map(|(field, _)| field.clone())
            .collect();
        (self.result, changed)
    }
}

/// 版本实际使用的安全组字段：按 ID 或按名称，都没有时按 ID
fn security_group_field(overlay: &Overlay<'_>) -> &'static str {
    if overlay.get(SECURITY_GROUP_IDS).is_none() && overlay.get(SECURITY_GROUPS).is_some() {
        SECURITY_GROUPS
    } else {
        SECURITY_GROUP_IDS
    }
}

fn string_set(value: Option<&Value>) -> BTreeSet<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// 在 deviceIndex 为 0 的网卡上设置公网 IP 开关，没有则新建
fn with_public_ip(current: Option<&Value>, associate: bool) -> Value {
    let mut interfaces: Vec<Value> = current
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let primary = interfaces
        .iter_mut()
        .find(|nic| nic.get("deviceIndex").and_then(Value::as_u64) == Some(0));
    match primary.and_then(Value::as_object_mut) {
        Some(nic) => {
            nic.insert("associatePublicIpAddress".to_string(), json!(associate));
        }
        None => interfaces.insert(
            0,
            json!({ "deviceIndex": 0, "associatePublicIpAddress": associate }),
        ),
    }
    Value::Array(interfaces)
}

fn block_device_mappings(devices: &[BlockDevice]) -> Value {
    let mappings: Vec<Value> = devices
        .iter()
        .map(|device| {
            let mut mapping = Map::new();
            mapping.insert("deviceName".to_string(), json!(device.device_name));
            if let Some(virtual_name) = &device.virtual_name {
                mapping.insert("virtualName".to_string(), json!(virtual_name));
                return Value::Object(mapping);
            }

            let mut ebs = Map::new();
            let fields = [
                ("volumeSize", device.size.map(|v| json!(v))),
                ("volumeType", device.volume_type.as_ref().map(|v| json!(v))),
                ("iops", device.iops.map(|v| json!(v))),
                ("snapshotId", device.snapshot_id.as_ref().map(|v| json!(v))),
                ("deleteOnTermination", device.delete_on_termination.map(|v| json!(v))),
                ("encrypted", device.encrypted.map(|v| json!(v))),
            ];
            for (name, value) in fields {
                if let Some(value) = value {
                    ebs.insert(name.to_string(), value);
                }
            }
            mapping.insert("ebs".to_string(), Value::Object(ebs));
            Value::Object(mapping)
        })
        .collect();
    Value::Array(mappings)
}

/// 从默认值加覆盖重建整个价格结构，不与旧结构逐字段合并
fn market_options(market: &MarketChanges) -> Result<Value, MutationError> {
    let market_type = market.market_type.as_deref().unwrap_or(SPOT_MARKET);
    if market_type.is_empty() {
        return Err(MutationError::InvalidField {
            field: "marketType".to_string(),
            reason: "must not be empty".to_string(),
        });
    }

    if market_type != SPOT_MARKET {
        if market.spot_price.is_some() || market.spot_instance_type.is_some() {
            return Err(MutationError::InvalidField {
                field: "spotPrice".to_string(),
                reason: format!("spot options are not valid for market type `{}`", market_type),
            });
        }
        return Ok(json!({ "marketType": market_type }));
    }

    let mut spot_options = Map::new();
    if let Some(price) = market.spot_price.as_deref().filter(|p| !p.is_empty()) {
        spot_options.insert("maxPrice".to_string(), json!(price));
    }
    spot_options.insert(
        "spotInstanceType".to_string(),
        json!(market
            .spot_instance_type
            .as_deref()
            .unwrap_or(DEFAULT_SPOT_INSTANCE_TYPE)),
    );

    Ok(json!({
        "marketType": SPOT_MARKET,
        "spotOptions": Value::Object(spot_options),
    }))
}
