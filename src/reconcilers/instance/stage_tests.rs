// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::reconcilers::instance::stage::Stage;
    use std::collections::HashSet;

    #[test]
    fn test_stage_names_parse_back() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
            assert_eq!(stage.to_string(), stage.as_str());
        }
    }

    #[test]
    fn test_stage_names_are_unique() {
        let names: HashSet<&str> = Stage::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(names.len(), Stage::ALL.len());
    }

    #[test]
    fn test_empty_persisted_stage_is_initial() {
        assert_eq!(
            Stage::from_persisted("").unwrap(),
            Stage::DeploymentUninitialized
        );
        assert_eq!(
            Stage::from_persisted("CordonOldWorkers").unwrap(),
            Stage::CordonOldWorkers
        );
    }

    #[test]
    fn test_unknown_stage_is_execution_failed() {
        let err = Stage::from_persisted("half-way").unwrap_err();
        assert!(err.is_execution_failed());
        assert!("deploymentcompleted".parse::<Stage>().is_err());
    }
}
