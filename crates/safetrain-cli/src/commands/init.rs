//! The `safetrain init` command.

use std::path::Path;

use anyhow::Result;
use serde_json::json;

use safetrain_core::memory::StoreSnapshot;
use safetrain_core::service::current_year;

const CONFIG_PATH: &str = "safetrain.toml";
const FIXTURE_PATH: &str = "fixtures/store.json";

pub fn execute() -> Result<()> {
    if Path::new(CONFIG_PATH).exists() {
        println!("{CONFIG_PATH} already exists, skipping.");
    } else {
        std::fs::write(CONFIG_PATH, SAMPLE_CONFIG)?;
        println!("Created {CONFIG_PATH}");
    }

    let fixture = Path::new(FIXTURE_PATH);
    if fixture.exists() {
        println!("{FIXTURE_PATH} already exists, skipping.");
    } else {
        sample_snapshot(current_year())?.save_json(fixture)?;
        println!("Created {FIXTURE_PATH}");
    }

    println!("\nNext steps:");
    println!("  1. Run: safetrain validate --fixture {FIXTURE_PATH}");
    println!("  2. Run: safetrain pending --employee emp-001");
    println!("  3. Switch [store] to airtable in {CONFIG_PATH} to use a live base");

    Ok(())
}

fn sample_snapshot(year: i32) -> Result<StoreSnapshot> {
    let snapshot = json!({
        "templates": [{
            "id": "tpl-induction",
            "code": "IND-01",
            "name": "Inducción en seguridad y salud",
            "type": "Inducción",
            "populationTarget": "All",
            "status": "Active",
            "validityYear": year,
            "passThresholdPercent": 60.0,
            "maxAttempts": 2,
            "randomizeQuestions": true,
            "showFeedback": true
        }, {
            "id": "tpl-copasst",
            "code": "COP-01",
            "name": "Funciones del COPASST",
            "populationTarget": "COPASST",
            "status": "Active",
            "validityYear": year,
            "maxAttempts": 1
        }],
        "questionLinks": [
            {"id": "lnk-1", "templateId": "tpl-induction", "questionId": "q-epp", "order": 1, "pointValue": 2.0, "required": true},
            {"id": "lnk-2", "templateId": "tpl-induction", "questionId": "q-casco", "order": 2, "pointValue": 1.0},
            {"id": "lnk-3", "templateId": "tpl-copasst", "questionId": "q-reunion", "order": 1, "pointValue": 1.0}
        ],
        "questions": [{
            "id": "q-epp",
            "text": "¿Qué elementos de protección son obligatorios en planta?",
            "type": "Selección Múltiple",
            "optionsRaw": "[{\"key\":\"A\",\"text\":\"Casco\"},{\"key\":\"B\",\"text\":\"Botas\"},{\"key\":\"C\",\"text\":\"Corbata\"}]",
            "correctAnswerRaw": "[\"A\",\"B\"]"
        }, {
            "id": "q-casco",
            "text": "El casco puede retirarse en zonas de carga.",
            "type": "Verdadero/Falso",
            "correctAnswerRaw": "FALSE",
            "explanation": "El casco es obligatorio en toda la planta."
        }, {
            "id": "q-reunion",
            "text": "¿Cada cuánto se reúne el comité?",
            "type": "Selección Única",
            "optionsRaw": ["Mensualmente", "Anualmente"],
            "correctAnswerRaw": "Mensualmente"
        }],
        "memberships": [
            {"employeeId": "emp-002", "committeeName": "COPASST", "status": "Active"}
        ],
        "excludedEmployees": ["emp-900"]
    });
    Ok(serde_json::from_value(snapshot)?)
}

const SAMPLE_CONFIG: &str = r#"# safetrain configuration

answer_batch_size = 10
employee_chunk_size = 25

[store]
type = "fixture"
path = "fixtures/store.json"

# [store]
# type = "airtable"
# api_key = "${AIRTABLE_API_KEY}"
# base_id = "appXXXXXXXXXXXXXX"
"#;
