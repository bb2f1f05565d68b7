// src/catalog/mod.rs

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Earliest year kept in the assembled dataset.
pub const FIRST_YEAR: i32 = 1990;

/// A country of interest: display name plus ISO alpha-3 code.
///
/// The ISO code is the join key everywhere in the pipeline; the display
/// name only surfaces in the `countries` dimension table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
    pub name: &'static str,
    pub iso3: &'static str,
}

pub static COUNTRIES: &[Country] = &[
    Country { name: "United States", iso3: "USA" },
    Country { name: "China", iso3: "CHN" },
    Country { name: "India", iso3: "IND" },
    Country { name: "Germany", iso3: "DEU" },
    Country { name: "United Arab Emirates", iso3: "ARE" },
];

/// One macroeconomic indicator: the wide-table column it lands in, the
/// upstream World Bank code it is fetched by, and the natural key, label
/// and unit used for the `indicators` dimension table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub column: &'static str,
    pub wb_code: &'static str,
    pub store_code: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
}

pub static INDICATORS: &[Indicator] = &[
    Indicator {
        column: "Birth_Rate_per_1000",
        wb_code: "SP.DYN.CBRT.IN",
        store_code: "birth_rate",
        label: "Birth Rate",
        unit: "per 1000",
    },
    Indicator {
        column: "Energy_Use_kgOE_per_Capita",
        wb_code: "EG.USE.PCAP.KG.OE",
        store_code: "energy_use",
        label: "Energy Use",
        unit: "kg of oil equivalent per capita",
    },
    Indicator {
        column: "population_total",
        wb_code: "SP.POP.TOTL",
        store_code: "population",
        label: "Total Population",
        unit: "people",
    },
    Indicator {
        column: "Literacy_Rate",
        wb_code: "SE.ADT.LITR.ZS",
        store_code: "literacy_rate",
        label: "Literacy Rate",
        unit: "%",
    },
    Indicator {
        column: "FDI_Net_Inflows_USD",
        wb_code: "BX.KLT.DINV.CD.WD",
        store_code: "fdi",
        label: "Foreign Direct Investment",
        unit: "USD",
    },
    Indicator {
        column: "Political_Instability",
        wb_code: "PV.EST",
        store_code: "political_stability",
        label: "Political Stability",
        unit: "index",
    },
    Indicator {
        column: "gdp_usd",
        wb_code: "NY.GDP.MKTP.CD",
        store_code: "gdp",
        label: "GDP (current US$)",
        unit: "USD",
    },
    Indicator {
        column: "gdp_real_growth_pct",
        wb_code: "NY.GDP.MKTP.KD.ZG",
        store_code: "gdp_growth",
        label: "GDP Growth Rate",
        unit: "%",
    },
    Indicator {
        column: "exports_pct_gdp",
        wb_code: "NE.EXP.GNFS.ZS",
        store_code: "exports_pct_gdp",
        label: "Exports (% of GDP)",
        unit: "%",
    },
    Indicator {
        column: "imports_pct_gdp",
        wb_code: "NE.IMP.GNFS.ZS",
        store_code: "imports_pct_gdp",
        label: "Imports (% of GDP)",
        unit: "%",
    },
    Indicator {
        column: "gross_capital_form_pct_gdp",
        wb_code: "NE.GDI.TOTL.ZS",
        store_code: "gross_capital_formation",
        label: "Gross Capital Formation (% of GDP)",
        unit: "%",
    },
    Indicator {
        column: "household_consump_pct_gdp",
        wb_code: "NE.CON.PRVT.ZS",
        store_code: "household_consumption",
        label: "Household Consumption (% of GDP)",
        unit: "%",
    },
    Indicator {
        column: "govt_consump_pct_gdp",
        wb_code: "NE.CON.GOVT.ZS",
        store_code: "govt_consumption",
        label: "Government Consumption (% of GDP)",
        unit: "%",
    },
    Indicator {
        column: "inflation_cpi_pct",
        wb_code: "FP.CPI.TOTL.ZG",
        store_code: "inflation",
        label: "Inflation (CPI)",
        unit: "%",
    },
    Indicator {
        column: "unemployment_pct",
        wb_code: "SL.UEM.TOTL.ZS",
        store_code: "unemployment",
        label: "Unemployment Rate",
        unit: "%",
    },
    Indicator {
        column: "population_growth_pct",
        wb_code: "SP.POP.GROW",
        store_code: "population_growth",
        label: "Population Growth",
        unit: "%",
    },
];

/// Columns that get a one-period lag companion, named `<base>_lag1`.
pub static LAG_BASES: &[&str] = &[
    "exports_pct_gdp",
    "imports_pct_gdp",
    "gross_capital_form_pct_gdp",
    "household_consump_pct_gdp",
    "govt_consump_pct_gdp",
    "inflation_cpi_pct",
    "unemployment_pct",
    "gdp_real_growth_pct",
];

/// Canonical data-column ordering for the output artifact. Country and
/// Year are the row key and always lead. Columns missing from the
/// assembled table are dropped from this ordering, not invented.
pub static FINAL_COLUMNS: &[&str] = &[
    "Birth_Rate_per_1000",
    "Energy_Use_kgOE_per_Capita",
    "population_total",
    "Literacy_Rate",
    "FDI_Net_Inflows_USD",
    "Political_Instability",
    "gdp_usd",
    "gdp_real_growth_pct",
    "exports_pct_gdp",
    "imports_pct_gdp",
    "gross_capital_form_pct_gdp",
    "household_consump_pct_gdp",
    "govt_consump_pct_gdp",
    "inflation_cpi_pct",
    "unemployment_pct",
    "net_exports_pct_gdp",
    "gdp_usd_log",
    "population_growth_pct",
    "exports_pct_gdp_lag1",
    "imports_pct_gdp_lag1",
    "gross_capital_form_pct_gdp_lag1",
    "household_consump_pct_gdp_lag1",
    "govt_consump_pct_gdp_lag1",
    "inflation_cpi_pct_lag1",
    "unemployment_pct_lag1",
    "gdp_real_growth_pct_lag1",
];

/// Wide-table column name → indicator, for the upload path.
pub static INDICATOR_BY_COLUMN: Lazy<HashMap<&'static str, &'static Indicator>> =
    Lazy::new(|| INDICATORS.iter().map(|i| (i.column, i)).collect());

pub fn country_by_iso(iso3: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.iso3 == iso3)
}
