// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Classified FIT records.

use crate::fit::profile::{
    base_type, device_info, file_id, garmin_product_name, manufacturer, manufacturer_name,
    mesg_num, sport, workout, FIT_EPOCH_OFFSET_SECS,
};
use crate::fit::Message;
use chrono::{DateTime, Utc};
use std::fmt;

/// A decoded message, tagged by the kinds the patcher acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// `file_id`: device identity for the whole file
    Identity(IdentityRecord),
    /// `device_info`: identity of one device or sensor in the session
    DeviceInfo(DeviceInfoRecord),
    /// Anything else, passed through untouched
    Other(Message),
}

impl From<Message> for Record {
    fn from(msg: Message) -> Self {
        match msg.global {
            mesg_num::FILE_ID => Record::Identity(IdentityRecord(msg)),
            mesg_num::DEVICE_INFO => Record::DeviceInfo(DeviceInfoRecord(msg)),
            _ => Record::Other(msg),
        }
    }
}

impl Record {
    pub fn message(&self) -> &Message {
        match self {
            Record::Identity(r) => &r.0,
            Record::DeviceInfo(r) => &r.0,
            Record::Other(m) => m,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Record::Identity(r) => r.0,
            Record::DeviceInfo(r) => r.0,
            Record::Other(m) => m,
        }
    }
}

/// View over a `file_id` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord(pub Message);

impl IdentityRecord {
    pub fn manufacturer_id(&self) -> Option<u16> {
        self.0.get_u16(file_id::MANUFACTURER)
    }

    pub fn product_id(&self) -> Option<u16> {
        self.0.get_u16(file_id::PRODUCT)
    }

    /// The `product` field read as a Garmin product (only when the maker is Garmin).
    pub fn garmin_product_id(&self) -> Option<u16> {
        garmin_subfield(self.manufacturer_id(), self.product_id())
    }

    /// `time_created` as Unix epoch milliseconds.
    pub fn created_at_millis(&self) -> Option<i64> {
        self.0
            .get_u32(file_id::TIME_CREATED)
            .map(|secs| (secs as i64 + FIT_EPOCH_OFFSET_SECS) * 1000)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    pub fn set_manufacturer_id(&mut self, value: u16) {
        self.0.set_u16(file_id::MANUFACTURER, value);
    }

    pub fn set_product_id(&mut self, value: u16) {
        self.0.set_u16(file_id::PRODUCT, value);
    }
}

/// View over a `device_info` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfoRecord(pub Message);

impl DeviceInfoRecord {
    pub fn manufacturer_id(&self) -> Option<u16> {
        self.0.get_u16(device_info::MANUFACTURER)
    }

    pub fn product_id(&self) -> Option<u16> {
        self.0.get_u16(device_info::PRODUCT)
    }

    pub fn garmin_product_id(&self) -> Option<u16> {
        garmin_subfield(self.manufacturer_id(), self.product_id())
    }

    pub fn set_manufacturer_id(&mut self, value: u16) {
        self.0.set_u16(device_info::MANUFACTURER, value);
    }

    pub fn set_product_id(&mut self, value: u16) {
        self.0.set_u16(device_info::PRODUCT, value);
    }

    /// Same storage as `product`; FIT resolves the subfield by manufacturer.
    pub fn set_garmin_product_id(&mut self, value: u16) {
        self.0.set_u16(device_info::PRODUCT, value);
    }
}

fn garmin_subfield(manufacturer_id: Option<u16>, product: Option<u16>) -> Option<u16> {
    match manufacturer_id {
        Some(manufacturer::GARMIN) => product,
        _ => None,
    }
}

/// Build the `workout` message that carries a human assigned title.
pub fn workout_name_record(name: &str) -> Record {
    let mut msg = Message::new(mesg_num::WORKOUT);
    msg.set_string(workout::WKT_NAME, name);
    msg.set_u8(workout::SPORT, base_type::ENUM, sport::CYCLING);
    Record::Other(msg)
}

/// Log-friendly summary of the identity fields of a record.
pub struct IdentitySummary {
    manufacturer: Option<u16>,
    product: Option<u16>,
    garmin_product: Option<u16>,
}

impl IdentitySummary {
    pub fn of(record: &Record) -> Option<Self> {
        match record {
            Record::Identity(r) => Some(Self {
                manufacturer: r.manufacturer_id(),
                product: r.product_id(),
                garmin_product: r.garmin_product_id(),
            }),
            Record::DeviceInfo(r) => Some(Self {
                manufacturer: r.manufacturer_id(),
                product: r.product_id(),
                garmin_product: r.garmin_product_id(),
            }),
            Record::Other(_) => None,
        }
    }
}

impl fmt::Display for IdentitySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let man = self
            .manufacturer
            .and_then(manufacturer_name)
            .unwrap_or("BLANK");
        let gar = self
            .garmin_product
            .and_then(garmin_product_name)
            .unwrap_or("BLANK");
        write!(
            f,
            "manufacturer: {:?} (\"{}\") - product: {:?} - garmin product: {:?} (\"{}\")",
            self.manufacturer, man, self.product, self.garmin_product, gar
        )
    }
}
