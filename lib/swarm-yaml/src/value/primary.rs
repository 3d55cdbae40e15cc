/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use anyhow::{Context, anyhow};
use yaml_rust::Yaml;

pub fn as_u16(v: &Yaml) -> anyhow::Result<u16> {
    match v {
        Yaml::String(s) => Ok(u16::from_str(s)?),
        Yaml::Integer(i) => Ok(u16::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'u16' should be 'string' or 'integer'"
        )),
    }
}

pub fn as_u32(v: &Yaml) -> anyhow::Result<u32> {
    match v {
        Yaml::String(s) => Ok(u32::from_str(s)?),
        Yaml::Integer(i) => Ok(u32::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'u32' should be 'string' or 'integer'"
        )),
    }
}

pub fn as_u64(v: &Yaml) -> anyhow::Result<u64> {
    match v {
        Yaml::String(s) => Ok(u64::from_str(s)?),
        Yaml::Integer(i) => Ok(u64::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'u64' should be 'string' or 'integer'"
        )),
    }
}

pub fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(s) => Ok(usize::from_str(s)?),
        Yaml::Integer(i) => Ok(usize::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'usize' should be 'string' or 'integer'"
        )),
    }
}

pub fn as_bool(v: &Yaml) -> anyhow::Result<bool> {
    match v {
        Yaml::String(s) => match s.to_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            _ => Err(anyhow!("invalid yaml string value for 'bool': {s}")),
        },
        Yaml::Boolean(value) => Ok(*value),
        Yaml::Integer(i) => Ok(*i != 0),
        _ => Err(anyhow!(
            "yaml value type for 'bool' should be 'boolean' / 'string' / 'integer'"
        )),
    }
}

pub fn as_string(v: &Yaml) -> anyhow::Result<String> {
    match v {
        Yaml::String(s) => Ok(s.to_string()),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Real(s) => Ok(s.to_string()),
        _ => Err(anyhow!(
            "yaml value type for string should be 'string' / 'integer' / 'real'"
        )),
    }
}

/// A single value is accepted as a list of one element.
pub fn as_list<T, F>(v: &Yaml, convert: F) -> anyhow::Result<Vec<T>>
where
    F: Fn(&Yaml) -> anyhow::Result<T>,
{
    let mut vec = Vec::new();
    match v {
        Yaml::Array(seq) => {
            for (i, v) in seq.iter().enumerate() {
                let node = convert(v).context(format!("invalid value for list element #{i}"))?;
                vec.push(node);
            }
        }
        _ => {
            let node = convert(v).context("invalid single value for the list")?;
            vec.push(node);
        }
    }
    Ok(vec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_bool() {
        assert!(as_bool(&yaml_str!("On")).unwrap());
        assert!(!as_bool(&yaml_str!("no")).unwrap());
        assert!(as_bool(&Yaml::Boolean(true)).unwrap());
        assert!(!as_bool(&Yaml::Integer(0)).unwrap());
        assert!(as_bool(&yaml_str!("maybe")).is_err());
        assert!(as_bool(&Yaml::Real("1.0".to_string())).is_err());
    }

    #[test]
    fn t_u16() {
        assert_eq!(as_u16(&yaml_str!("443")).unwrap(), 443);
        assert_eq!(as_u16(&Yaml::Integer(8090)).unwrap(), 8090);
        assert!(as_u16(&Yaml::Integer(65536)).is_err());
        assert!(as_u16(&Yaml::Integer(-1)).is_err());
    }

    #[test]
    fn t_usize() {
        assert_eq!(as_usize(&yaml_str!("10")).unwrap(), 10);
        assert!(as_usize(&Yaml::Boolean(true)).is_err());
    }

    #[test]
    fn t_string() {
        assert_eq!(as_string(&yaml_str!("peer")).unwrap(), "peer");
        assert_eq!(as_string(&Yaml::Integer(1)).unwrap(), "1");
        assert!(as_string(&Yaml::Null).is_err());
    }

    #[test]
    fn t_list() {
        let v = yaml_doc!("- a.example\n- b.example");
        assert_eq!(
            as_list(&v, as_string).unwrap(),
            vec!["a.example".to_string(), "b.example".to_string()]
        );
        assert_eq!(
            as_list(&yaml_str!("c.example"), as_string).unwrap(),
            vec!["c.example".to_string()]
        );

        let v = yaml_doc!("- 1\n- x");
        assert!(as_list(&v, as_u16).is_err());
    }
}
