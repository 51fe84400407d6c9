/// Source names used in logs, metrics labels and error messages
pub const CRM_SOURCE: &str = "crm";
pub const ERP_SOURCE: &str = "erp";
pub const ECOMMERCE_SOURCE: &str = "ecommerce";

/// Raw source tag the ERP loader stamps on every order
pub const DEFAULT_ERP_SOURCE_LABEL: &str = "ERP_Fisica";

/// Field separator shared by the CRM and ERP exports
pub const DEFAULT_SOURCE_DELIMITER: char = ';';

/// National document lengths: individual (11 digits) and entity (14 digits)
pub const VALID_DOCUMENT_LENGTHS: [usize; 2] = [11, 14];

/// Default size of the seller revenue ranking
pub const DEFAULT_TOP_SELLERS: usize = 10;

// Stage names (used in spans, metrics labels and CLI output)
pub const STAGE_INTEGRATE: &str = "integrate";
pub const STAGE_ENRICH: &str = "enrich";
pub const STAGE_KPIS: &str = "kpis";

/// Default config file looked up when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "pipeline.toml";

/// Built-in seller alias table, applied after uppercase + trim
pub const DEFAULT_SELLER_ALIASES: &[(&str, &str)] = &[
    ("NATALIA R.", "NATALIA"),
    ("USUÁRIO DE TESTE", "TESTE"),
    ("JESSICA", "JESSICA"),
    ("KELI", "KELI"),
    ("SANDRA", "SANDRA"),
    ("GABI", "GABI"),
    ("FANNY", "FANNY"),
    ("DENIZE", "DENIZE"),
    ("DANISIO", "DANISIO"),
    ("NATALIA", "NATALIA"),
];
