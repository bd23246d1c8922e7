#[macro_export]
macro_rules! column_kind_registry_entries {
    ($macro:ident $(, @args $($args:tt)+ )?) => {
        $macro! {
            $(
                @args $($args)+;
            )?
            @entries
            (
                SignedInt,
                label = "signed_int",
                cell_width = Some(8),
                requires_max_length = false,
                supports_auto_increment = true
            ),
            (
                UnsignedInt,
                label = "unsigned_int",
                cell_width = Some(8),
                requires_max_length = false,
                supports_auto_increment = true
            ),
            (
                Double,
                label = "double",
                cell_width = Some(8),
                requires_max_length = false,
                supports_auto_increment = true
            ),
            (
                Decimal,
                label = "decimal",
                cell_width = Some(16),
                requires_max_length = false,
                supports_auto_increment = false
            ),
            (
                String,
                label = "string",
                cell_width = None,
                requires_max_length = true,
                supports_auto_increment = false
            ),
            (
                Binary,
                label = "binary",
                cell_width = None,
                requires_max_length = true,
                supports_auto_increment = false
            ),
            (
                Date,
                label = "date",
                cell_width = Some(10),
                requires_max_length = false,
                supports_auto_increment = false
            ),
            (
                Time,
                label = "time",
                cell_width = Some(8),
                requires_max_length = false,
                supports_auto_increment = false
            ),
            (
                DateTime,
                label = "datetime",
                cell_width = Some(19),
                requires_max_length = false,
                supports_auto_increment = false
            ),
        }
    };
}

#[macro_export]
macro_rules! column_kind_registry {
    ($macro:ident) => {
        $crate::column_kind_registry_entries!($macro)
    };
    ($macro:ident, $($args:tt)+) => {
        $crate::column_kind_registry_entries!($macro, @args $($args)+)
    };
}

macro_rules! metadata_from_registry {
    ( @args $kind:expr; @entries $( ($column:ident, label = $label:expr, cell_width = $cell_width:expr, requires_max_length = $requires_max_length:expr, supports_auto_increment = $supports_auto_increment:expr) ),* $(,)? ) => {
        match $kind {
            $(
                $crate::ColumnKind::$column => $crate::ColumnMetadata {
                    label: $label,
                    cell_width: $cell_width,
                    requires_max_length: $requires_max_length,
                    supports_auto_increment: $supports_auto_increment,
                },
            )*
        }
    };
}

macro_rules! all_kinds_from_registry {
    ( @entries $( ($column:ident, label = $label:expr, cell_width = $cell_width:expr, requires_max_length = $requires_max_length:expr, supports_auto_increment = $supports_auto_increment:expr) ),* $(,)? ) => {
        [ $( $crate::ColumnKind::$column ),* ]
    };
}
