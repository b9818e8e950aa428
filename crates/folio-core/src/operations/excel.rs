//! Excel workbook operations
//!
//! Rows and columns are zero-based. Operations default to the first sheet
//! when `sheetName` is omitted.

use serde_json::{Value, json};

use super::{
    Access, HandlerRegistry, OperationContext, OperationHandler, ParamKind, ParamSpec, Parameters,
    ResultType,
};
use crate::document::Workbook;
use crate::error::Result;

/// Build the Excel handler table
pub fn registry() -> Result<HandlerRegistry<Workbook>> {
    HandlerRegistry::<Workbook>::new()
        .with(ListSheets)?
        .with(AddSheet)?
        .with(InsertRow)?
        .with(DeleteRow)?
        .with(SetCell)?
        .with(GetCell)?
        .with(GetRange)
}

pub struct ListSheets;

impl OperationHandler<Workbook> for ListSheets {
    fn operation(&self) -> &'static str {
        "list_sheets"
    }

    fn description(&self) -> &'static str {
        "List worksheets with their dimensions"
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::List
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Workbook>,
        _params: &Parameters,
    ) -> Result<Value> {
        let sheets = context
            .document()
            .sheets
            .iter()
            .enumerate()
            .map(|(index, sheet)| {
                json!({
                    "index": index,
                    "name": sheet.name,
                    "rows": sheet.row_count(),
                    "columns": sheet.column_count(),
                })
            })
            .collect();
        Ok(Value::Array(sheets))
    }
}

const ADD_SHEET_PARAMS: &[ParamSpec] = &[ParamSpec::required("sheetName", ParamKind::String)];

pub struct AddSheet;

impl OperationHandler<Workbook> for AddSheet {
    fn operation(&self) -> &'static str {
        "add_sheet"
    }

    fn description(&self) -> &'static str {
        "Append an empty worksheet"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        ADD_SHEET_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Number
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Workbook>,
        params: &Parameters,
    ) -> Result<Value> {
        let name: String = params.required("sheetName")?;
        let index = context.document_mut()?.add_sheet(&name)?;
        context.mark_modified();
        Ok(json!(index))
    }
}

const INSERT_ROW_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("rowIndex", ParamKind::Integer),
    ParamSpec::optional("values", ParamKind::Array),
    ParamSpec::optional("sheetName", ParamKind::String),
];

pub struct InsertRow;

impl OperationHandler<Workbook> for InsertRow {
    fn operation(&self) -> &'static str {
        "insert_row"
    }

    fn description(&self) -> &'static str {
        "Insert a row before the given index, shifting later rows down"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        INSERT_ROW_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Workbook>,
        params: &Parameters,
    ) -> Result<Value> {
        let row_index: usize = params.required("rowIndex")?;
        let values: Vec<String> = params.optional("values", Vec::new())?;
        let sheet_name: Option<String> = params.get("sheetName")?;

        let sheet = context.document_mut()?.sheet_mut(sheet_name.as_deref())?;
        sheet.insert_row(row_index, values)?;
        let result = json!({
            "sheet": sheet.name,
            "rowIndex": row_index,
            "rowCount": sheet.row_count(),
        });
        context.mark_modified();
        Ok(result)
    }
}

const DELETE_ROW_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("rowIndex", ParamKind::Integer),
    ParamSpec::optional("sheetName", ParamKind::String),
];

pub struct DeleteRow;

impl OperationHandler<Workbook> for DeleteRow {
    fn operation(&self) -> &'static str {
        "delete_row"
    }

    fn description(&self) -> &'static str {
        "Delete a row, shifting later rows up"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        DELETE_ROW_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::List
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Workbook>,
        params: &Parameters,
    ) -> Result<Value> {
        let row_index: usize = params.required("rowIndex")?;
        let sheet_name: Option<String> = params.get("sheetName")?;

        let removed = context
            .document_mut()?
            .sheet_mut(sheet_name.as_deref())?
            .delete_row(row_index)?;
        context.mark_modified();
        Ok(json!(removed))
    }
}

const SET_CELL_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("row", ParamKind::Integer),
    ParamSpec::required("column", ParamKind::Integer),
    ParamSpec::required("value", ParamKind::String),
    ParamSpec::optional("sheetName", ParamKind::String),
];

pub struct SetCell;

impl OperationHandler<Workbook> for SetCell {
    fn operation(&self) -> &'static str {
        "set_cell"
    }

    fn description(&self) -> &'static str {
        "Set a cell value, growing the sheet if needed"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        SET_CELL_PARAMS
    }

    fn result_type(&self) -> ResultType {
        ResultType::Object
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Workbook>,
        params: &Parameters,
    ) -> Result<Value> {
        let row: usize = params.required("row")?;
        let column: usize = params.required("column")?;
        let value: String = params.required("value")?;
        let sheet_name: Option<String> = params.get("sheetName")?;

        let sheet = context.document_mut()?.sheet_mut(sheet_name.as_deref())?;
        let previous = sheet.cell(row, column).map(str::to_string);
        sheet.set_cell(row, column, value)?;
        context.mark_modified();
        Ok(json!({ "row": row, "column": column, "previous": previous }))
    }
}

const GET_CELL_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("row", ParamKind::Integer),
    ParamSpec::required("column", ParamKind::Integer),
    ParamSpec::optional("sheetName", ParamKind::String),
];

pub struct GetCell;

impl OperationHandler<Workbook> for GetCell {
    fn operation(&self) -> &'static str {
        "get_cell"
    }

    fn description(&self) -> &'static str {
        "Read a cell value; empty cells return null"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        GET_CELL_PARAMS
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::Text
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Workbook>,
        params: &Parameters,
    ) -> Result<Value> {
        let row: usize = params.required("row")?;
        let column: usize = params.required("column")?;
        let sheet_name: Option<String> = params.get("sheetName")?;

        let sheet = context.document().sheet(sheet_name.as_deref())?;
        Ok(json!(sheet.cell(row, column)))
    }
}

const GET_RANGE_PARAMS: &[ParamSpec] = &[
    ParamSpec::optional("startRow", ParamKind::Integer),
    ParamSpec::optional("endRow", ParamKind::Integer),
    ParamSpec::optional("sheetName", ParamKind::String),
];

pub struct GetRange;

impl OperationHandler<Workbook> for GetRange {
    fn operation(&self) -> &'static str {
        "get_range"
    }

    fn description(&self) -> &'static str {
        "Read rows startRow..=endRow (whole sheet by default)"
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        GET_RANGE_PARAMS
    }

    fn access(&self) -> Access {
        Access::Read
    }

    fn result_type(&self) -> ResultType {
        ResultType::List
    }

    fn execute(
        &self,
        context: &mut OperationContext<'_, Workbook>,
        params: &Parameters,
    ) -> Result<Value> {
        let sheet_name: Option<String> = params.get("sheetName")?;
        let start: usize = params.optional("startRow", 0)?;
        let end: usize = params.optional("endRow", usize::MAX)?;
        if end < start {
            return Err(params.invalid("endRow", format!("must not be less than startRow ({})", start)));
        }

        let sheet = context.document().sheet(sheet_name.as_deref())?;
        Ok(json!(sheet.range(start, end)))
    }
}
