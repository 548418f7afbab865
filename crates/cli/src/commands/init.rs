// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whirr init`

use whirr_core::Config;

pub fn handle(config: &Config) -> anyhow::Result<()> {
    config.init()?;
    println!("initialized {}", config.data_root.display());
    Ok(())
}
