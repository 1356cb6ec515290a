pub mod get_chart;
pub mod get_device_list;
